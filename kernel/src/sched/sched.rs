//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 调度器实现
//!
//! 单 CPU、优先级抢占式调度器。所有调度状态集中在 [`Scheduler`] 中：
//! 线程表、就绪队列、睡眠队列、同步原语状态、`load_avg` 和时钟滴答。
//!
//! 并发模型：唯一的并发来源是中断。修改调度状态的操作都在关中断的
//! 临界区内完成；中断处理函数（[`Scheduler::timer_interrupt`]）不能直接
//! 切换线程，只设置 `need_resched`，在中断返回时再让出 CPU。
//!
//! 线程切换本身（保存/恢复寄存器）由体系结构层完成，这里的
//! [`Scheduler::schedule`] 只决定下一个运行的线程并更新 `current`。
//!
//! 两种模式在启动时选定，互斥：
//! - 优先级模式：手动设置优先级，锁上发生优先级捐赠
//! - MLFQS：优先级由 `recent_cpu` 和 `nice` 周期性计算，不捐赠

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::config::{DONATION_DEPTH, MAX_THREADS, PRI_DEFAULT, PRI_MAX, PRI_MIN, TIMER_FREQ, TIME_SLICE};
use crate::mm::SpaceId;
use crate::process::pid::TidAllocator;
use crate::process::task::{Membership, Task, TaskState, ThreadEntry, Tid};
use crate::sync::SyncTable;

use super::fixed_point::Fixed;
use super::runqueue::{PriorityQueue, SleepQueue};
use super::SchedError;

/// MLFQS 重新计算优先级的周期（滴答）
const PRIORITY_PERIOD: u64 = 4;

/// 中断开关状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    On,
    Off,
}

/// 滴答统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickStats {
    /// idle 线程运行的滴答数
    pub idle_ticks: u64,
    /// 内核线程运行的滴答数
    pub kernel_ticks: u64,
    /// 用户进程运行的滴答数
    pub user_ticks: u64,
}

/// 调度器
pub struct Scheduler {
    tasks: BTreeMap<Tid, Task>,
    tids: TidAllocator,
    max_threads: usize,

    current: Tid,
    main: Tid,
    idle: Tid,

    ready: PriorityQueue,
    sleepers: SleepQueue,
    /// 已退出、等待回收的线程
    destruction: Vec<Tid>,
    exit_codes: BTreeMap<Tid, i32>,

    pub(crate) sync: SyncTable,

    mlfqs: bool,
    load_avg: Fixed,

    ticks: u64,
    /// 当前线程已用的时间片
    slice_ticks: u32,
    stats: TickStats,
    switches: u64,

    intr: IntrLevel,
    in_interrupt: bool,
    /// 中断返回时需要让出 CPU
    need_resched: bool,
}

impl Scheduler {
    /// 创建调度器
    ///
    /// 当前执行流成为引导线程 `main`（tid 1），同时创建 idle 线程。
    pub fn new(mlfqs: bool) -> Self {
        Self::with_capacity(mlfqs, MAX_THREADS)
    }

    /// 指定线程控制块池大小（包含 main 和 idle）
    pub fn with_capacity(mlfqs: bool, max_threads: usize) -> Self {
        assert!(max_threads >= 2, "sched: need room for main and idle");

        let tids = TidAllocator::new();
        let main = tids.alloc().unwrap_or(1);
        let idle = tids.alloc().unwrap_or(main + 1);

        let mut main_task = Task::new(main, "main", PRI_DEFAULT, None, 0);
        main_task.state = TaskState::Running;
        let idle_task = Task::new(idle, "idle", PRI_MIN, None, 0);

        let mut tasks = BTreeMap::new();
        tasks.insert(main, main_task);
        tasks.insert(idle, idle_task);

        log::info!(
            "sched: initialized, mode={}, max_threads={}",
            if mlfqs { "mlfqs" } else { "priority" },
            max_threads
        );

        Self {
            tasks,
            tids,
            max_threads,
            current: main,
            main,
            idle,
            ready: PriorityQueue::new(),
            sleepers: SleepQueue::new(),
            destruction: Vec::new(),
            exit_codes: BTreeMap::new(),
            sync: SyncTable::new(),
            mlfqs,
            load_avg: Fixed::ZERO,
            ticks: 0,
            slice_ticks: 0,
            stats: TickStats::default(),
            switches: 0,
            intr: IntrLevel::On,
            in_interrupt: false,
            need_resched: false,
        }
    }

    // ============================================================
    // 线程查询
    // ============================================================

    /// 当前线程号
    pub fn current(&self) -> Tid {
        self.current
    }

    /// 当前线程控制块
    ///
    /// 控制块的完整性标记被破坏说明内核栈溢出，直接 panic。
    pub fn current_task(&self) -> &Task {
        let task = self.task_ref(self.current);
        assert!(task.is_intact(), "sched: thread {} control block corrupted", task.tid());
        task
    }

    pub fn task(&self, tid: Tid) -> Option<&Task> {
        self.tasks.get(&tid)
    }

    pub fn main_tid(&self) -> Tid {
        self.main
    }

    pub fn idle_tid(&self) -> Tid {
        self.idle
    }

    pub fn thread_count(&self) -> usize {
        self.tasks.len()
    }

    /// 就绪线程数
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// 已退出线程的退出码
    pub fn exit_status(&self, tid: Tid) -> Option<i32> {
        self.exit_codes.get(&tid).copied()
    }

    pub fn is_mlfqs(&self) -> bool {
        self.mlfqs
    }

    /// 线程切换次数
    pub fn switch_count(&self) -> u64 {
        self.switches
    }

    fn task_ref(&self, tid: Tid) -> &Task {
        match self.tasks.get(&tid) {
            Some(t) => t,
            None => panic!("sched: no such thread {}", tid),
        }
    }

    pub(crate) fn task_mut(&mut self, tid: Tid) -> &mut Task {
        match self.tasks.get_mut(&tid) {
            Some(t) => t,
            None => panic!("sched: no such thread {}", tid),
        }
    }

    /// 线程的有效优先级（不存在时视为最低）
    pub(crate) fn priority_of(&self, tid: Tid) -> i32 {
        priority_in(&self.tasks, tid)
    }

    // ============================================================
    // 中断状态
    // ============================================================

    pub fn intr_get_level(&self) -> IntrLevel {
        self.intr
    }

    /// 关中断，返回之前的状态
    pub fn intr_disable(&mut self) -> IntrLevel {
        core::mem::replace(&mut self.intr, IntrLevel::Off)
    }

    /// 开中断，返回之前的状态
    pub fn intr_enable(&mut self) -> IntrLevel {
        assert!(!self.in_interrupt, "sched: enabling interrupts inside a handler");
        core::mem::replace(&mut self.intr, IntrLevel::On)
    }

    pub fn intr_set_level(&mut self, level: IntrLevel) -> IntrLevel {
        match level {
            IntrLevel::On => self.intr_enable(),
            IntrLevel::Off => self.intr_disable(),
        }
    }

    /// 是否处于外部中断上下文
    pub fn in_interrupt(&self) -> bool {
        self.in_interrupt
    }

    // ============================================================
    // 线程生命周期
    // ============================================================

    /// 创建线程并放入就绪队列
    ///
    /// 新线程继承创建者的 `nice` 和 `recent_cpu`。
    /// 新线程优先级高于当前线程时立即抢占。
    ///
    /// # 返回
    /// - `Ok(tid)`: 新线程号
    /// - `Err(SchedError::OutOfThreads)`: 控制块池耗尽
    pub fn spawn(
        &mut self,
        name: &str,
        priority: i32,
        entry: ThreadEntry,
        aux: usize,
    ) -> Result<Tid, SchedError> {
        self.spawn_in(name, priority, entry, aux, None)
    }

    /// 创建在地址空间 `space` 中运行的线程
    ///
    /// 地址空间在线程进入就绪队列之前绑定。
    pub fn spawn_in(
        &mut self,
        name: &str,
        priority: i32,
        entry: ThreadEntry,
        aux: usize,
        space: Option<SpaceId>,
    ) -> Result<Tid, SchedError> {
        if self.tasks.len() >= self.max_threads {
            log::warn!("sched: cannot spawn {}: thread table full", name);
            return Err(SchedError::OutOfThreads);
        }
        let tid = self.tids.alloc().ok_or(SchedError::OutOfThreads)?;

        let mut task = Task::new(tid, name, priority, Some(entry), aux);
        task.space = space;
        {
            let parent = self.task_ref(self.current);
            task.nice = parent.nice;
            task.recent_cpu = parent.recent_cpu;
        }
        if self.mlfqs {
            let p = mlfqs_priority(&task);
            task.base_priority = p;
            task.priority = p;
        }

        log::debug!("sched: spawn {} '{}' priority {}", tid, name, task.priority);
        self.tasks.insert(tid, task);
        self.unblock(tid);
        self.preempt_check();
        Ok(tid)
    }

    /// 阻塞当前线程
    ///
    /// 调用者必须已经关中断，并且已经把当前线程挂到它要等待的队列上。
    /// 不能在中断上下文中调用。
    pub fn block(&mut self) {
        assert!(!self.in_interrupt, "sched: block() in interrupt context");
        assert_eq!(self.intr, IntrLevel::Off, "sched: block() with interrupts on");

        let cur = self.current;
        self.task_mut(cur).state = TaskState::Blocked;
        self.schedule();
    }

    /// 唤醒阻塞线程，放入就绪队列
    ///
    /// 可在中断上下文中调用；不会抢占当前线程，需要时由调用者执行
    /// [`Scheduler::preempt_check`]。线程必须处于 Blocked 状态，并且已经
    /// 从等待队列中取下。
    pub fn unblock(&mut self, tid: Tid) {
        let old = self.intr_disable();
        let task = self.task_mut(tid);
        assert_eq!(task.state, TaskState::Blocked, "sched: unblock of non-blocked thread {}", tid);
        assert_eq!(
            task.membership,
            Membership::None,
            "sched: thread {} still queued elsewhere",
            tid
        );
        task.state = TaskState::Ready;
        task.membership = Membership::Ready;
        self.ready.push(tid);
        self.restore(old);
    }

    /// 让出 CPU
    ///
    /// 当前线程回到就绪队列中同优先级线程之后。
    pub fn yield_now(&mut self) {
        assert!(!self.in_interrupt, "sched: yield in interrupt context");
        let old = self.intr_disable();
        let cur = self.current;
        if cur == self.idle {
            self.task_mut(cur).state = TaskState::Blocked;
        } else {
            let task = self.task_mut(cur);
            task.state = TaskState::Ready;
            task.membership = Membership::Ready;
            self.ready.push(cur);
        }
        self.schedule();
        self.restore(old);
    }

    /// 当前线程退出
    ///
    /// 持有的锁依次移交给各自的等待者。控制块在下一次调度时回收，
    /// main 线程的控制块永不回收。
    pub fn exit(&mut self, status: i32) {
        assert!(!self.in_interrupt, "sched: exit in interrupt context");
        let cur = self.current;
        assert_ne!(cur, self.idle, "sched: idle thread cannot exit");

        let old = self.intr_disable();
        crate::sync::lock::release_all(self, cur);

        let task = self.task_mut(cur);
        task.exit_status = status;
        task.state = TaskState::Dying;
        log::debug!("sched: thread {} '{}' exits with {}", cur, task.name(), status);
        self.exit_codes.insert(cur, status);

        self.schedule();
        self.restore(old);
    }

    /// 选择下一个线程并切换
    ///
    /// 调用时中断必须关闭，当前线程已经离开 Running 状态。
    /// 上一次切换留下的退出线程在这里回收：此时 CPU 已经不在它们的栈上。
    pub(crate) fn schedule(&mut self) {
        debug_assert_eq!(self.intr, IntrLevel::Off);
        let prev = self.current;
        debug_assert_ne!(self.task_ref(prev).state, TaskState::Running);

        while let Some(tid) = self.destruction.pop() {
            if let Some(task) = self.tasks.remove(&tid) {
                log::debug!("sched: reaped thread {} '{}'", tid, task.name());
            }
        }

        let next = self.pick_next_task();
        {
            let task = self.task_mut(next);
            task.state = TaskState::Running;
            task.membership = Membership::None;
        }
        self.slice_ticks = 0;

        if prev != next {
            if self.task_ref(prev).state == TaskState::Dying && prev != self.main {
                self.destruction.push(prev);
            }
            self.current = next;
            self.switches += 1;
            #[cfg(feature = "debug_log")]
            log::trace!("sched: switch {} -> {}", prev, next);
        }

        if cfg!(debug_assertions) {
            self.check_invariants();
        }
    }

    /// 从就绪队列取出最高优先级线程，为空时返回 idle
    fn pick_next_task(&mut self) -> Tid {
        let tasks = &self.tasks;
        self.ready
            .pop_max(|tid| priority_in(tasks, tid))
            .unwrap_or(self.idle)
    }

    /// 抢占检查
    ///
    /// 就绪队列中有比当前线程优先级更高的线程时让出 CPU；
    /// 中断上下文中推迟到中断返回。idle 线程遇到任何就绪线程都让出。
    pub fn preempt_check(&mut self) {
        let cur = self.current;
        let top = {
            let tasks = &self.tasks;
            self.ready.peek_max(|tid| priority_in(tasks, tid))
        };
        let top = match top {
            Some(t) => t,
            None => return,
        };
        if cur != self.idle && self.priority_of(top) <= self.priority_of(cur) {
            return;
        }
        if self.in_interrupt {
            self.need_resched = true;
        } else {
            self.yield_now();
        }
    }

    fn restore(&mut self, old: IntrLevel) {
        if old == IntrLevel::On && !self.in_interrupt {
            self.intr = IntrLevel::On;
        }
    }

    // ============================================================
    // 定时器
    // ============================================================

    /// 启动以来的滴答数
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// 自 `then` 以来经过的滴答数
    pub fn elapsed(&self, then: u64) -> u64 {
        self.ticks.saturating_sub(then)
    }

    /// 当前线程睡眠 `ticks` 个滴答，`ticks <= 0` 时立即返回
    pub fn sleep(&mut self, ticks: i64) {
        if ticks <= 0 {
            return;
        }
        let wake = self.ticks + ticks as u64;
        self.sleep_until(wake);
    }

    /// 当前线程睡眠到第 `wake_tick` 个滴答
    pub fn sleep_until(&mut self, wake_tick: u64) {
        if wake_tick <= self.ticks {
            return;
        }
        assert!(!self.in_interrupt, "sched: sleep in interrupt context");
        let cur = self.current;
        assert_ne!(cur, self.idle, "sched: idle thread cannot sleep");

        let old = self.intr_disable();
        let task = self.task_mut(cur);
        task.wake_tick = wake_tick;
        task.membership = Membership::Sleep;
        self.sleepers.push(cur, wake_tick);
        self.block();
        self.restore(old);
    }

    /// 最早的唤醒时刻
    pub fn next_wakeup(&self) -> Option<u64> {
        self.sleepers.next_wakeup()
    }

    /// 定时器中断处理
    ///
    /// 顺序：滴答计数 -> 线程统计（MLFQS 计算、时间片）-> 唤醒到期线程
    /// -> 抢占检查。需要切换时在中断返回处让出 CPU。
    pub fn timer_interrupt(&mut self) {
        self.external_interrupt(|s| {
            s.ticks += 1;
            s.scheduler_tick();
            s.wake_sleepers();
            s.preempt_check();
        });
    }

    /// 在外部中断上下文中运行 `handler`
    ///
    /// 处理函数里唤醒的高优先级线程不会立即运行，而是在中断返回时
    /// 由当前线程让出 CPU。设备驱动（例如磁盘完成中断里的 `Semaphore::up`）
    /// 也通过这里进入。
    pub fn external_interrupt<R>(&mut self, handler: impl FnOnce(&mut Self) -> R) -> R {
        assert!(!self.in_interrupt, "sched: nested external interrupt");
        let old = self.intr_disable();
        self.in_interrupt = true;

        let result = handler(self);

        self.in_interrupt = false;
        if self.need_resched {
            self.need_resched = false;
            self.yield_now();
        }
        self.restore(old);
        result
    }

    /// 每个滴答对当前线程的记账
    fn scheduler_tick(&mut self) {
        let cur = self.current;
        if cur == self.idle {
            self.stats.idle_ticks += 1;
        } else if self.task_ref(cur).space.is_some() {
            self.stats.user_ticks += 1;
        } else {
            self.stats.kernel_ticks += 1;
        }

        if self.mlfqs {
            self.mlfqs_tick();
        }

        self.slice_ticks += 1;
        if self.slice_ticks >= TIME_SLICE {
            self.need_resched = true;
        }
    }

    /// 唤醒所有唤醒时刻不晚于当前滴答的线程
    fn wake_sleepers(&mut self) {
        while let Some(tid) = self.sleepers.pop_expired(self.ticks) {
            self.task_mut(tid).membership = Membership::None;
            #[cfg(feature = "debug_log")]
            log::trace!("sched: wake {} at tick {}", tid, self.ticks);
            self.unblock(tid);
        }
    }

    // ============================================================
    // MLFQS
    // ============================================================

    fn mlfqs_tick(&mut self) {
        let cur = self.current;
        let idle = self.idle;
        if cur != idle {
            let task = self.task_mut(cur);
            task.recent_cpu = task.recent_cpu + 1;
        }

        // 先用衰减前的 recent_cpu 重算优先级，再做每秒一次的更新
        if self.ticks % PRIORITY_PERIOD == 0 {
            for (tid, task) in self.tasks.iter_mut() {
                if *tid != idle {
                    let p = mlfqs_priority(task);
                    task.base_priority = p;
                    task.priority = p;
                }
            }
        }

        if self.ticks % TIMER_FREQ == 0 {
            let running = if cur != idle { 1 } else { 0 };
            let ready_threads = self.ready.len() as i32 + running;
            self.load_avg =
                Fixed::from_int(59) / 60 * self.load_avg + Fixed::from_int(ready_threads) / 60;

            let twice_load = self.load_avg * 2;
            let decay = twice_load / (twice_load + 1);
            for (tid, task) in self.tasks.iter_mut() {
                if *tid != idle {
                    task.recent_cpu = decay * task.recent_cpu + task.nice;
                }
            }
        }
    }

    /// 系统负载 ×100，四舍五入
    pub fn get_load_avg(&self) -> i32 {
        self.load_avg.round_scaled(100) as i32
    }

    /// 当前线程的 recent_cpu ×100，四舍五入
    pub fn get_recent_cpu(&self) -> i32 {
        // recent_cpu 超过 1310 后 ×100 放不进 17.14
        let scaled = self.current_task().recent_cpu.round_scaled(100);
        scaled.clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    pub fn load_avg(&self) -> Fixed {
        self.load_avg
    }

    pub fn get_nice(&self) -> i32 {
        self.current_task().nice
    }

    /// 设置当前线程的 nice 值，MLFQS 下立即重新计算优先级
    pub fn set_nice(&mut self, nice: i32) {
        let old = self.intr_disable();
        let mlfqs = self.mlfqs;
        let cur = self.current;
        let task = self.task_mut(cur);
        task.set_nice(nice);
        if mlfqs {
            let p = mlfqs_priority(task);
            task.base_priority = p;
            task.priority = p;
        }
        self.restore(old);
        self.preempt_check();
    }

    // ============================================================
    // 优先级与捐赠
    // ============================================================

    /// 当前线程的有效优先级
    pub fn get_priority(&self) -> i32 {
        self.current_task().priority
    }

    /// 设置当前线程的基础优先级
    ///
    /// 有效优先级取基础优先级和仍在生效的捐赠中的最大值，
    /// 所以降低优先级不会撤销正在进行的捐赠。MLFQS 下忽略。
    pub fn set_priority(&mut self, priority: i32) {
        if self.mlfqs {
            log::warn!("sched: set_priority ignored under mlfqs");
            return;
        }
        let old = self.intr_disable();
        let cur = self.current;
        self.task_mut(cur).base_priority = priority.clamp(PRI_MIN, PRI_MAX);
        self.refresh_priority(cur);
        self.restore(old);
        self.preempt_check();
    }

    /// 重新计算线程的有效优先级
    ///
    /// 有效优先级 = max(基础优先级, 所持每把锁上等待者的有效优先级)。
    pub(crate) fn refresh_priority(&mut self, tid: Tid) -> i32 {
        if self.mlfqs {
            return self.priority_of(tid);
        }
        let task = self.task_ref(tid);
        let mut priority = task.base_priority;
        for &lock in task.held_locks.iter() {
            for waiter in self.sync.lock(lock).waiters.iter() {
                priority = priority.max(self.priority_of(waiter));
            }
        }
        self.task_mut(tid).priority = priority;
        priority
    }

    /// 沿等待链传播优先级变化
    ///
    /// `tid` 等待的锁的持有者重新计算优先级，持有者若也在等锁则继续向上，
    /// 最多 [`DONATION_DEPTH`] 层。
    pub(crate) fn propagate_priority(&mut self, tid: Tid) {
        if self.mlfqs {
            return;
        }
        let mut waiter = tid;
        for _ in 0..DONATION_DEPTH {
            let lock = match self.task_ref(waiter).waiting_lock {
                Some(l) => l,
                None => break,
            };
            let holder = match self.sync.lock(lock).holder {
                Some(h) => h,
                None => break,
            };
            let before = self.priority_of(holder);
            if self.refresh_priority(holder) == before {
                break;
            }
            waiter = holder;
        }
    }

    /// 从某个同步原语的等待队列中取出最高优先级的线程
    pub(crate) fn pop_waiter(
        &mut self,
        queue: impl FnOnce(&mut SyncTable) -> &mut PriorityQueue,
    ) -> Option<Tid> {
        let tasks = &self.tasks;
        queue(&mut self.sync).pop_max(|tid| priority_in(tasks, tid))
    }

    // ============================================================
    // 地址空间
    // ============================================================

    /// 绑定线程的用户地址空间
    pub fn set_space(&mut self, tid: Tid, space: Option<SpaceId>) -> Result<(), SchedError> {
        let task = self.tasks.get_mut(&tid).ok_or(SchedError::NoSuchThread)?;
        task.space = space;
        Ok(())
    }

    /// 当前线程的地址空间
    pub fn current_space(&self) -> Option<SpaceId> {
        self.current_task().space
    }

    /// 系统调用入口保存用户栈指针
    pub fn set_user_rsp(&mut self, rsp: usize) {
        let cur = self.current;
        self.task_mut(cur).user_rsp = Some(rsp);
    }

    // ============================================================
    // 统计与校验
    // ============================================================

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// 打印滴答统计
    pub fn print_stats(&self) {
        log::info!(
            "sched: {} idle ticks, {} kernel ticks, {} user ticks",
            self.stats.idle_ticks,
            self.stats.kernel_ticks,
            self.stats.user_ticks
        );
    }

    /// 校验队列归属不变量
    ///
    /// 每个线程至多在一个队列中，且与其 `membership` 和状态一致；
    /// 恰好一个线程处于 Running，且它就是 `current`。
    pub fn check_invariants(&self) {
        let mut running = 0;
        for (&tid, task) in self.tasks.iter() {
            assert!(task.is_intact(), "sched: thread {} control block corrupted", tid);

            let mut found = self.sync.queues_containing(tid);
            if self.ready.contains(tid) {
                found.push(Membership::Ready);
            }
            if self.sleepers.contains(tid) {
                found.push(Membership::Sleep);
            }
            assert!(found.len() <= 1, "sched: thread {} in several queues: {:?}", tid, found);
            let expected = found.first().copied().unwrap_or(Membership::None);
            assert_eq!(task.membership, expected, "sched: thread {} membership mismatch", tid);

            match task.state {
                TaskState::Running => {
                    running += 1;
                    assert_eq!(tid, self.current, "sched: thread {} running but not current", tid);
                    assert_eq!(task.membership, Membership::None);
                }
                TaskState::Ready => assert_eq!(task.membership, Membership::Ready),
                TaskState::Blocked => assert_ne!(task.membership, Membership::Ready),
                TaskState::Dying => assert_eq!(task.membership, Membership::None),
            }
        }
        assert_eq!(running, 1, "sched: {} running threads", running);
        assert!(!self.ready.contains(self.idle), "sched: idle thread in ready queue");
    }

    /// 遍历所有线程
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }
}

fn priority_in(tasks: &BTreeMap<Tid, Task>, tid: Tid) -> i32 {
    tasks.get(&tid).map_or(PRI_MIN, |t| t.priority)
}

/// MLFQS 优先级：PRI_MAX - round(recent_cpu/4) - nice*2，截到合法范围
fn mlfqs_priority(task: &Task) -> i32 {
    let p = PRI_MAX - (task.recent_cpu / 4).round() - task.nice * 2;
    p.clamp(PRI_MIN, PRI_MAX)
}
