#![no_main]
use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use mirrored_ring_buffer::MirroredRingBuffer;
use std::collections::VecDeque;

#[derive(Debug, Arbitrary)]
enum Op {
    PushBack(i64),
    PushFront(i64),
    PopBack,
    PopFront,
    Clear,
    CheckView,
}

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let ops: Vec<Op> = match Vec::<Op>::arbitrary(&mut unstructured) {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let mut rb = MirroredRingBuffer::with_capacity(1).expect("mapping failed");
    let cap = rb.capacity();
    let mut model = VecDeque::<i64>::new();

    for op in ops {
        match op {
            Op::PushBack(value) => {
                assert_eq!(rb.try_push_back(value).is_some(), model.len() < cap);
                if model.len() < cap {
                    model.push_back(value);
                }
            }
            Op::PushFront(value) => {
                assert_eq!(rb.try_push_front(value).is_some(), model.len() < cap);
                if model.len() < cap {
                    model.push_front(value);
                }
            }
            Op::PopBack => {
                assert_eq!(rb.pop_back(), model.pop_back());
            }
            Op::PopFront => {
                assert_eq!(rb.pop_front(), model.pop_front());
            }
            Op::Clear => {
                rb.clear();
                model.clear();
            }
            Op::CheckView => {
                assert_eq!(rb.len(), model.len());
                assert_eq!(rb.as_slice(), model.make_contiguous());
            }
        }
    }

    assert_eq!(rb.as_slice(), model.make_contiguous());
});
