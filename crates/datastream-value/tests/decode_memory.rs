//! Decoding hostile payloads must not reserve memory out of proportion to
//! the payload itself.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

use datastream_value::{decode_sequence, ValueError};

struct CountingAlloc;

static LIVE: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            let live = LIVE.fetch_add(layout.size(), Ordering::SeqCst) + layout.size();
            PEAK.fetch_max(live, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        LIVE.fetch_sub(layout.size(), Ordering::SeqCst);
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

const PAYLOAD_SIZE: usize = 4 * 1024 * 1024;
const LEVELS: usize = 63;

/// A frame-sized payload of nested lists, each declaring `count(remaining)`
/// elements, padded with bytes that are not a valid tag.
fn nested_list_payload(count: impl Fn(usize) -> usize) -> Vec<u8> {
    let mut raw = Vec::with_capacity(PAYLOAD_SIZE);
    raw.extend_from_slice(&1u32.to_be_bytes());
    for _ in 0..LEVELS {
        raw.push(0x0B);
        let remaining = PAYLOAD_SIZE - raw.len() - 4;
        raw.extend_from_slice(&(count(remaining) as u32).to_be_bytes());
    }
    raw.resize(PAYLOAD_SIZE, 0x00);
    raw
}

/// Peak bytes allocated on top of what was live before `f` ran.
fn peak_during<T>(f: impl FnOnce() -> T) -> (T, usize) {
    let baseline = LIVE.load(Ordering::SeqCst);
    PEAK.store(baseline, Ordering::SeqCst);
    let out = f();
    let peak = PEAK.load(Ordering::SeqCst).saturating_sub(baseline);
    (out, peak)
}

#[test]
fn nested_list_counts_do_not_drive_allocation() {
    let limit = 8 * 1024 * 1024;

    // Counts equal to the bytes left are rejected at the first list.
    let raw = nested_list_payload(|remaining| remaining);
    let (result, peak) = peak_during(|| decode_sequence(&raw));
    assert!(matches!(result, Err(ValueError::CountTooLarge { .. })));
    assert!(peak < limit, "peak allocation {peak} bytes");

    // Counts that pass the size check at every level still reserve little.
    let raw = nested_list_payload(|remaining| remaining / 2);
    let (result, peak) = peak_during(|| decode_sequence(&raw));
    assert_eq!(result, Err(ValueError::UnknownTag(0x00)));
    assert!(peak < limit, "peak allocation {peak} bytes");
}
