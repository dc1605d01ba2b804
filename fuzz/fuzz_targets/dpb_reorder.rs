#![no_main]

use frameflow::dpb::Dpb;
use frameflow::dpb::DpbPicture;
use frameflow::dpb::FrameInfo;
use frameflow::dpb::ReorderKind;
use frameflow::Ticks;
use libfuzzer_sys::fuzz_target;

struct Pic(Option<Ticks>);

impl DpbPicture for Pic {
    fn date(&self) -> Option<Ticks> {
        self.0
    }

    fn set_date(&mut self, date: Ticks) {
        self.0 = Some(date);
    }
}

// Drives the reorder engine with an arbitrary submission sequence. The
// engine asserts its counter invariants internally; this target turns any
// violation into a crash.
fuzz_target!(|data: &[u8]| {
    let mut chunks = data.chunks_exact(4);
    let Some(first) = chunks.next() else { return };

    let kind = if first[0] % 2 == 0 {
        ReorderKind::PicOrderCount
    } else {
        ReorderKind::Timestamp
    };
    let fields_per_buffer = 1 + usize::from(first[1] % 2);
    let mut dpb: Dpb<Pic> = Dpb::new(kind, fields_per_buffer);

    for chunk in chunks {
        let mut info = FrameInfo::new(Pic(None));
        info.foc = i32::from(chunk[0] as i8);
        info.poc = info.foc;
        info.pts = (chunk[1] != 0).then(|| Ticks(i64::from(chunk[1]) * 1000));
        info.is_field = chunk[2] & 0x01 != 0;
        info.num_ticks = if info.is_field { 1 } else { 2 };
        info.output_needed = chunk[2] & 0x02 != 0;
        info.flush = chunk[2] & 0x04 != 0;
        info.is_keyframe = chunk[2] & 0x08 != 0;
        info.no_rasl_output = chunk[2] & 0x10 != 0;
        info.no_output_of_prior_pics = chunk[2] & 0x20 != 0;
        info.max_pics_buffering = 1 + usize::from(chunk[3] & 0x0f);
        info.max_num_reorder = usize::from(chunk[3] >> 4 & 0x03);
        info.max_latency_pics = u32::from(chunk[3] >> 6);

        let _ = dpb.push(info);

        if chunk[2] & 0x40 != 0 {
            let _ = dpb.drain();
        }
        if chunk[2] & 0x80 != 0 {
            dpb.flush();
        }
    }

    let _ = dpb.drain();
    assert_eq!(dpb.stored_fields(), 0);
    assert_eq!(dpb.need_output_size(), 0);
});
