use std::alloc::{GlobalAlloc, Layout};
use std::cell::RefCell;
use wavemaker::clock::FixedClock;
use wavemaker::controller::Controller;
use wavemaker::params::Config;
use wavemaker::waveform::Waveform;

thread_local! {
    static ALLOC_COUNT: RefCell<usize> = const { RefCell::new(0) };
    static DEALLOC_COUNT: RefCell<usize> = const { RefCell::new(0) };
}

struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        ALLOC_COUNT.with(|c| *c.borrow_mut() += 1);
        unsafe { std::alloc::System.alloc(layout) }
    }
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        DEALLOC_COUNT.with(|c| *c.borrow_mut() += 1);
        unsafe { std::alloc::System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static A: CountingAllocator = CountingAllocator;

fn counts() -> (usize, usize) {
    (
        ALLOC_COUNT.with(|c| *c.borrow()),
        DEALLOC_COUNT.with(|c| *c.borrow()),
    )
}

#[test]
fn tick_alloc_invariant() {
    let (mut controller, mut staging) =
        Controller::new_with_channels(FixedClock::new(1_000_000), Config::new(0.5, 0));
    staging
        .provide_waveform(Waveform::from_samples(vec![0.1, 0.2, 0.3, 0.4]))
        .unwrap();

    let before = counts();
    for _ in 0..10_000 {
        controller.tick();
    }
    assert_eq!(counts(), before, "tick should not allocate or free");
}

#[test]
fn exchange_tick_does_not_free() {
    let (mut controller, mut staging) =
        Controller::new_with_channels(FixedClock::new(1_000_000), Config::new(1.0, 0));
    staging
        .provide_waveform(Waveform::from_samples(vec![1.0; 64]))
        .unwrap();
    controller.tick();
    staging.pause().unwrap();
    controller.tick();

    // Replacement, parameter and reclaim events are all applied on ticks.
    staging
        .provide_waveform(Waveform::from_samples(vec![2.0; 64]))
        .unwrap();
    staging.set_gain(0.25).unwrap();
    staging.set_loops(3).unwrap();

    let before = counts();
    controller.tick();
    assert_eq!(counts(), before, "exchange tick should not allocate or free");

    staging.reclaim().unwrap();
    let before = counts();
    controller.tick();
    assert_eq!(counts(), before, "reclaim tick should not allocate or free");

    assert!(controller.waveform().is_empty());
    assert_eq!(staging.take_waveform().map(|w| w.len()), Some(64));
    assert_eq!(staging.take_waveform().map(|w| w.len()), Some(64));
}
