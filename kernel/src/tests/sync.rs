//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 测试：信号量与锁

use super::nop;
use crate::config::PRI_DEFAULT;
use crate::process::task::Membership;
use crate::sched::Scheduler;
use crate::sync::lock::Lock;
use crate::sync::semaphore::Semaphore;
use crate::sync::Acquire;

#[test]
fn test_semaphore_counts() {
    let mut s = Scheduler::new(false);
    let sema = Semaphore::new(&mut s, 2);
    assert_eq!(sema.down(&mut s), Acquire::Immediate);
    assert!(sema.try_down(&mut s));
    assert!(!sema.try_down(&mut s));
    sema.up(&mut s);
    assert_eq!(sema.value(&s), 1);
}

#[test]
fn test_semaphore_wakes_by_priority() {
    let mut s = Scheduler::new(false);
    let sema = Semaphore::new(&mut s, 0);
    let mut tids = vec![];
    for p in [PRI_DEFAULT + 1, PRI_DEFAULT + 3, PRI_DEFAULT + 2] {
        let t = s.spawn("waiter", p, nop, 0).unwrap();
        assert_eq!(sema.down(&mut s), Acquire::Blocked);
        assert_eq!(s.task(t).unwrap().membership(), Membership::Sema(sema.id()));
        tids.push(t);
    }
    assert_eq!(sema.waiter_count(&s), 3);

    // up 把这一个单位直接交给被唤醒者，值不增加
    let mut order = vec![];
    for _ in 0..3 {
        sema.up(&mut s);
        order.push(s.current());
        assert_eq!(sema.value(&s), 0);
        s.exit(0);
    }
    assert_eq!(order, vec![tids[1], tids[2], tids[0]]);
    assert_eq!(s.current(), 1);
}

#[test]
fn test_lock_try_acquire() {
    let mut s = Scheduler::new(false);
    let lock = Lock::new(&mut s);
    assert!(lock.try_acquire(&mut s));
    assert!(lock.held_by_current(&s));

    let t = s.spawn("t", PRI_DEFAULT + 1, nop, 0).unwrap();
    assert!(!lock.try_acquire(&mut s));
    // try_acquire 不捐赠
    assert_eq!(s.task(1).unwrap().priority(), PRI_DEFAULT);
    s.exit(0);
    assert!(s.task(t).is_some());
    lock.release(&mut s);
    assert_eq!(lock.holder(&s), None);
}

#[test]
fn test_exit_hands_over_held_locks() {
    let mut s = Scheduler::new(false);
    let lock = Lock::new(&mut s);
    let t = s.spawn("holder", PRI_DEFAULT - 1, nop, 0).unwrap();
    s.set_priority(PRI_DEFAULT - 2);
    assert_eq!(s.current(), t);
    lock.acquire(&mut s);
    s.set_priority(PRI_DEFAULT - 3);
    assert_eq!(s.current(), 1);

    // main 等锁并捐赠，持有者退出时锁移交给 main
    assert_eq!(lock.acquire(&mut s), Acquire::Blocked);
    assert_eq!(s.current(), t);
    assert_eq!(s.get_priority(), PRI_DEFAULT - 2);
    s.exit(1);
    assert_eq!(s.current(), 1);
    assert_eq!(lock.holder(&s), Some(1));
    assert_eq!(s.current_task().held_locks(), &[lock.id()]);
}

#[test]
#[should_panic(expected = "non-holder")]
fn test_release_by_non_holder_panics() {
    let mut s = Scheduler::new(false);
    let lock = Lock::new(&mut s);
    lock.release(&mut s);
}

#[test]
#[should_panic(expected = "recursive")]
fn test_recursive_acquire_panics() {
    let mut s = Scheduler::new(false);
    let lock = Lock::new(&mut s);
    lock.acquire(&mut s);
    lock.acquire(&mut s);
}
