//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{step_buffer, ConfigBuilder};
use common::mock_helpers::{DropCounter, VecQueue};
use scope_link::pipeline::HandoffQueue;

#[test]
fn test_infrastructure_setup() {
    let config = ConfigBuilder::new().channels(2).build();
    assert!(config.validate().is_ok());
    assert_eq!(config.pipeline.channel_count, 2);
    assert_eq!(step_buffer(2, 8).frame_count(), 8);
}

#[test]
fn test_vec_queue_is_fifo_and_reclaims() {
    let counter = DropCounter::default();
    let queue = VecQueue::new("test");
    for id in 0..5 {
        queue.push(counter.item(id));
    }
    assert_eq!(queue.pop().map(|t| t.id), Some(0));
    assert_eq!(queue.drain(), 4);
    assert!(queue.is_empty());
    assert_eq!(counter.dropped(), 5);
}

#[test]
fn test_wait_until() {
    assert!(common::wait_until(|| true));
}
