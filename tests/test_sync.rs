use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tinyserve::server::worker::{WorkQueue, WorkerPool};
use tinyserve::sync::Semaphore;

#[test]
fn test_semaphore_wait_and_post_across_threads() {
    let sem = Arc::new(Semaphore::new(0).unwrap());
    let poster = {
        let sem = Arc::clone(&sem);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sem.post();
        })
    };

    sem.wait();
    poster.join().unwrap();
    assert_eq!(sem.available(), 0);
}

#[test]
fn test_semaphore_wait_timeout() {
    let sem = Semaphore::new(0).unwrap();
    let start = Instant::now();
    assert!(!sem.wait_timeout(Duration::from_millis(30)));
    assert!(start.elapsed() >= Duration::from_millis(30));

    sem.post();
    assert!(sem.wait_timeout(Duration::from_millis(30)));
}

#[test]
fn test_work_queue_is_bounded() {
    let queue = WorkQueue::new(2).unwrap();
    assert!(queue.push(1).is_ok());
    assert!(queue.push(2).is_ok());
    assert_eq!(queue.push(3), Err(3));

    assert_eq!(queue.pop(), Some(1));
    assert_eq!(queue.pop(), Some(2));
    assert!(queue.is_empty());
}

#[test]
fn test_closed_queue_refuses_and_wakes() {
    let queue = Arc::new(WorkQueue::<u32>::new(4).unwrap());
    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.pop())
    };

    thread::sleep(Duration::from_millis(20));
    queue.close(1);
    assert_eq!(consumer.join().unwrap(), None);
    assert_eq!(queue.push(7), Err(7));
}

#[test]
fn test_worker_pool_runs_every_job() {
    let done = Arc::new(AtomicUsize::new(0));
    let mut pool = {
        let done = Arc::clone(&done);
        WorkerPool::new(4, 1000, move |n: usize| {
            done.fetch_add(n, Ordering::SeqCst);
        })
        .unwrap()
    };
    assert_eq!(pool.threads(), 4);

    for _ in 0..100 {
        pool.submit(1).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while done.load(Ordering::SeqCst) < 100 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 100);
}

#[test]
fn test_worker_pool_rejects_zero_threads() {
    assert!(WorkerPool::new(0, 10, |_: u8| {}).is_err());
}
