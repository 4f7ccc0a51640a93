mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use gfx_hal::backend::headless::BackendCall;
use gfx_hal::config::{Config, Queues};
use gfx_hal::{
    BufferAccessProfile, BufferMemoryProfile, Commands, Error, QueueClass, Rectangle,
};
use parking_lot::Mutex;

#[test]
fn write_and_read_back_buffer() {
    let harness = Harness::start();
    let context = &harness.context;

    let buffer = context.new_buffer();
    let mut queue = context.immediate(QueueClass::General);
    queue
        .assign_buffer_memory(
            &buffer,
            256,
            BufferMemoryProfile::RareWriteOftenRead,
            BufferAccessProfile::CpuToGpu,
        )
        .unwrap();
    queue.write_buffer(&buffer, vec![0xAB; 64]).unwrap();

    context.wait_all_queues_empty();

    assert_eq!(context.buffer_size(&buffer).unwrap(), 256);
    let data = context.read_buffer(&buffer, 0, 64).unwrap();
    assert_eq!(&data[..], &[0xAB; 64][..]);

    let rest = context.read_buffer(&buffer, 64, 192).unwrap();
    assert!(rest.iter().all(|byte| *byte == 0));

    assert!(harness.take_errors().is_empty());
}

#[test]
fn copy_between_buffers() {
    let harness = Harness::start();
    let context = &harness.context;

    let src = context.new_buffer();
    let dst = context.new_buffer();

    let mut queue = context.immediate(QueueClass::Transfer);
    for buffer in [&src, &dst] {
        queue
            .assign_buffer_memory(
                buffer,
                16,
                BufferMemoryProfile::OftenWriteOftenRead,
                BufferAccessProfile::GpuToGpu,
            )
            .unwrap();
    }
    queue.write_buffer(&src, (0..16).collect::<Vec<u8>>()).unwrap();
    queue.copy_buffer_to_buffer(&src, &dst, 4, 8, 0).unwrap();
    context.wait_queue_empty(QueueClass::Transfer);

    let data = context.read_buffer(&dst, 0, 8).unwrap();
    assert_eq!(&data[..], &[4, 5, 6, 7, 8, 9, 10, 11]);
}

#[test]
fn read_of_unallocated_buffer_is_reported() {
    let harness = Harness::start();
    let buffer = harness.context.new_buffer();

    let err = harness.context.read_buffer(&buffer, 0, 4).unwrap_err();
    assert!(matches!(err, Error::NotReady(_)));
    assert_eq!(harness.take_errors().len(), 1);
}

#[test]
fn same_queue_keeps_order_per_thread() {
    let harness = Harness::start();
    let events = Arc::new(Mutex::new(Vec::new()));

    std::thread::scope(|scope| {
        for thread in 0..4 {
            let context = &harness.context;
            let events = events.clone();
            scope.spawn(move || {
                for n in 0..100 {
                    let events = events.clone();
                    context
                        .enqueue(QueueClass::Transfer, move |_| {
                            events.lock().push((thread, n));
                        })
                        .unwrap();
                }
            });
        }
    });

    harness.context.wait_queue_empty(QueueClass::Transfer);

    let events = events.lock();
    assert_eq!(events.len(), 400);
    for thread in 0..4 {
        let order: Vec<_> = events
            .iter()
            .filter(|(t, _)| *t == thread)
            .map(|(_, n)| *n)
            .collect();
        assert_eq!(order, (0..100).collect::<Vec<_>>());
    }
}

#[test]
fn command_buffer_replays_on_every_submission() {
    let harness = Harness::start();
    let context = &harness.context;

    let rects = [
        Rectangle::new(0, 0, 1, 1),
        Rectangle::new(0, 0, 2, 2),
        Rectangle::new(0, 0, 3, 3),
    ];

    let buffer = context.new_command_buffer();
    let mut recording = buffer.begin_recording().unwrap();
    for rect in rects {
        recording.set_viewport(rect).unwrap();
    }
    recording.end_recording();

    context
        .submit_command_buffer(&buffer, QueueClass::General)
        .unwrap();
    context
        .submit_command_buffer(&buffer, QueueClass::General)
        .unwrap();

    let viewports: Vec<_> = harness
        .flush()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::SetViewport(rect) => Some(rect),
            _ => None,
        })
        .collect();

    let expected: Vec<_> = rects.iter().chain(rects.iter()).copied().collect();
    assert_eq!(viewports, expected);
    assert_eq!(buffer.read().unwrap().len(), 3);
}

#[test]
fn submit_while_recording_takes_recorded_commands() {
    let harness = Harness::start();
    let context = &harness.context;

    let first = Rectangle::new(0, 0, 1, 1);
    let second = Rectangle::new(0, 0, 2, 2);

    let buffer = context.new_command_buffer();
    let mut recording = buffer.begin_recording().unwrap();
    recording.set_viewport(first).unwrap();

    context
        .submit_command_buffer(&buffer, QueueClass::General)
        .unwrap();
    buffer.configure(QueueClass::General).unwrap();

    recording.set_viewport(second).unwrap();
    assert_eq!(recording.len(), 2);
    recording.end_recording();
    context.submit(&buffer).unwrap();

    let viewports: Vec<_> = harness
        .flush()
        .into_iter()
        .filter_map(|call| match call {
            BackendCall::SetViewport(rect) => Some(rect),
            _ => None,
        })
        .collect();
    assert_eq!(viewports, [first, first, second]);

    let recording = buffer.begin_recording().unwrap();
    buffer.clear().unwrap();
    assert!(recording.is_empty());
}

#[test]
fn submission_uses_configured_target() {
    let harness = Harness::start();
    let context = &harness.context;

    let ran = Arc::new(AtomicUsize::new(0));
    let buffer = context.new_command_buffer();
    buffer.configure(QueueClass::Compute).unwrap();

    let mut recording = buffer.begin_recording().unwrap();
    recording.set_scissors(Rectangle::default()).unwrap();
    recording.end_recording();

    // Block the engine so the submission is still queued when inspected.
    let (tx, rx) = std::sync::mpsc::channel::<()>();
    context
        .enqueue(QueueClass::General, move |_| {
            let _ = rx.recv();
        })
        .unwrap();

    context.submit(&buffer).unwrap();
    assert!(!harness.log.snapshot().contains(&BackendCall::SetScissors(Rectangle::default())));

    {
        let ran = ran.clone();
        context
            .enqueue(QueueClass::Compute, move |_| {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    tx.send(()).unwrap();
    context.wait_queue_empty(QueueClass::Compute);

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert!(harness.log.snapshot().contains(&BackendCall::SetScissors(Rectangle::default())));
}

#[test]
fn fence_is_signaled_after_submission() {
    let harness = Harness::start();
    let context = &harness.context;

    let fence = context.new_fence();
    // Never submitted.
    fence.wait().unwrap();
    assert!(!fence.is_signaled().unwrap());

    let (tx, rx) = std::sync::mpsc::channel::<()>();
    context
        .enqueue(QueueClass::General, move |_| {
            let _ = rx.recv();
        })
        .unwrap();

    let buffer = context.new_command_buffer();
    let mut recording = buffer.begin_recording().unwrap();
    recording.set_viewport(Rectangle::default()).unwrap();
    recording.end_recording();

    context
        .submit_command_buffer_with_fence(&buffer, QueueClass::General, &fence)
        .unwrap();
    assert!(!fence.wait_timeout(Duration::from_millis(10)).unwrap());

    tx.send(()).unwrap();
    fence.wait().unwrap();
    assert!(fence.is_signaled().unwrap());
    assert!(harness
        .log
        .snapshot()
        .contains(&BackendCall::SetViewport(Rectangle::default())));
}

#[test]
fn fence_waiter_does_not_stall_engine() {
    let harness = Harness::start();
    let context = &harness.context;

    let (tx, rx) = std::sync::mpsc::channel::<()>();
    context
        .enqueue(QueueClass::General, move |_| {
            let _ = rx.recv();
        })
        .unwrap();

    let fence = context.new_fence();
    let buffer = context.new_command_buffer();
    context
        .submit_command_buffer_with_fence(&buffer, QueueClass::General, &fence)
        .unwrap();

    let waiter = std::thread::spawn({
        let fence = fence.clone();
        move || fence.wait().unwrap()
    });
    std::thread::sleep(Duration::from_millis(20));

    // A writer must not queue behind the blocked waiter.
    drop(fence.write().unwrap());

    tx.send(()).unwrap();
    context.finish().unwrap();
    waiter.join().unwrap();
    assert!(fence.is_signaled().unwrap());
}

#[test]
fn enable_queues_validates_count() {
    let harness = Harness::start();
    let context = &harness.context;

    for class in QueueClass::ALL {
        assert_eq!(context.max_queues(class), 1);
        context.enable_queues(class, 1).unwrap();
    }
    assert!(harness.take_errors().is_empty());

    let err = context.enable_queues(QueueClass::Compute, 2).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidQueueCount {
            class: QueueClass::Compute,
            count: 2,
            max: 1
        }
    ));
    assert_eq!(harness.take_errors(), [err.to_string()]);
}

#[test]
fn invalid_configured_queues_are_reported() {
    let config = Config {
        queues: Queues {
            compute: 1,
            transfer: 3,
        },
        ..Default::default()
    };

    let harness = Harness::with_config(&config);
    assert_eq!(harness.take_errors().len(), 1);

    // The engine keeps working.
    harness.context.finish().unwrap();
}

#[test]
fn panicking_task_is_reported_and_engine_continues() {
    let harness = Harness::start();
    let context = &harness.context;

    context
        .enqueue(QueueClass::General, |_| panic!("broken task"))
        .unwrap();
    context.finish().unwrap();

    let errors = harness.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("broken task"));
}

#[test]
fn execute_raw_runs_on_engine() {
    let harness = Harness::start();

    let limits = Arc::new(Mutex::new(None));
    harness
        .context
        .execute_raw({
            let limits = limits.clone();
            move |backend| *limits.lock() = Some(backend.limits())
        })
        .unwrap();
    harness.context.finish().unwrap();

    assert_eq!(limits.lock().as_ref(), Some(harness.context.limits()));
    assert_eq!(harness.context.shading_language_name(), "GLSL");
    assert_eq!(harness.context.max_color_attachments(), 8);
}

#[test]
fn dropped_objects_are_deleted_on_engine() {
    let harness = Harness::start();
    let context = &harness.context;

    let sampler = context.new_sampler();
    let frame_buffer = context.new_frame_buffer();
    context.finish().unwrap();

    let sampler_id = sampler.read().unwrap().id().unwrap();
    let frame_buffer_id = frame_buffer.read().unwrap().id().unwrap();

    drop(sampler);
    drop(frame_buffer);
    let calls = harness.flush();

    assert!(calls.contains(&BackendCall::DeleteSampler(sampler_id)));
    assert!(calls.contains(&BackendCall::DeleteFrameBuffer(frame_buffer_id)));
}

#[test]
fn stop_drains_queues() {
    let harness = Harness::start();
    let counter = Arc::new(AtomicUsize::new(0));

    for class in QueueClass::ALL {
        for _ in 0..50 {
            let counter = counter.clone();
            harness
                .context
                .enqueue(class, move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
    }

    let mut queue = harness.context.immediate(QueueClass::General);
    let Harness {
        context, errors, ..
    } = harness;
    context.stop();

    assert_eq!(counter.load(Ordering::SeqCst), 150);

    let err = queue.set_viewport(Rectangle::default()).unwrap_err();
    assert!(matches!(err, Error::EngineStopped));
    assert_eq!(errors.lock().len(), 1);
}
