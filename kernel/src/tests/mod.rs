//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 跨模块场景测试
//!
//! 每个文件覆盖一块功能：调度、优先级捐赠、定时睡眠、MLFQS、缺页与栈增长、
//! 交换、mmap、fork。这里提供虚拟内存的宿主机替身：
//! - [`RamPool`]: 容量受限的物理页池
//! - [`SoftMmu`]: 软件页表，记录 accessed/dirty 位
//! - [`RamDisk`]: 内存中的交换设备
//! - [`MemFile`]: 带 I/O 计数的内存文件
//! - [`Machine`]: 通过缺页处理执行用户态读写

mod mmap;
mod sync;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

use crate::config::{PAGE_SIZE, SECTORS_PER_SLOT, SECTOR_SIZE, USER_STACK_TOP};
use crate::mm::{
    BlockDevice, FaultFlags, FileHandle, MapError, Mmu, PagePool, PhysAddr, SpaceId, VirtAddr, Vm,
    VmError, VmFile,
};

/// 线程入口占位
pub fn nop(_: usize) {}

// ============================================================
// 物理页池
// ============================================================

const POOL_BASE: usize = 0x10_0000;

/// 最多提供 `capacity` 页的物理页池
pub struct RamPool {
    pages: BTreeMap<usize, Box<[u8]>>,
    free: Vec<usize>,
    capacity: usize,
}

impl RamPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            pages: BTreeMap::new(),
            free: Vec::new(),
            capacity,
        }
    }
}

impl PagePool for RamPool {
    fn acquire_page(&mut self, zero: bool) -> Option<PhysAddr> {
        let pa = match self.free.pop() {
            Some(pa) => pa,
            None if self.pages.len() < self.capacity => {
                let pa = POOL_BASE + self.pages.len() * PAGE_SIZE;
                self.pages.insert(pa, vec![0u8; PAGE_SIZE].into_boxed_slice());
                pa
            }
            None => return None,
        };
        if zero {
            self.pages.get_mut(&pa)?.fill(0);
        }
        Some(PhysAddr::new(pa))
    }

    fn release_page(&mut self, pa: PhysAddr) {
        assert!(!self.free.contains(&pa.as_usize()), "page {} released twice", pa);
        // 用垃圾填充，读到已释放的页会暴露出来
        if let Some(page) = self.pages.get_mut(&pa.as_usize()) {
            page.fill(0xcc);
        }
        self.free.push(pa.as_usize());
    }

    fn page(&self, pa: PhysAddr) -> &[u8] {
        &self.pages[&pa.as_usize()]
    }

    fn page_mut(&mut self, pa: PhysAddr) -> &mut [u8] {
        self.pages.get_mut(&pa.as_usize()).expect("unknown physical page")
    }
}

// ============================================================
// 软件 MMU
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pte {
    pub pa: PhysAddr,
    pub writable: bool,
    pub accessed: bool,
    pub dirty: bool,
}

/// 共享状态的软件页表，测试持有一个克隆用来模拟硬件置位
#[derive(Clone, Default)]
pub struct SoftMmu {
    ptes: Arc<Mutex<BTreeMap<(SpaceId, usize), Pte>>>,
    /// 还要让多少次 map 因页表页不足而失败
    map_failures: Arc<AtomicUsize>,
}

impl SoftMmu {
    /// 让接下来的 `n` 次 map 返回 `MapError::OutOfMemory`
    pub fn fail_next_maps(&self, n: usize) {
        self.map_failures.store(n, Ordering::SeqCst);
    }

    pub fn translate(&self, space: SpaceId, va: VirtAddr) -> Option<Pte> {
        self.ptes.lock().get(&(space, va.floor().as_usize())).copied()
    }

    /// 模拟一次访问：置 accessed，写访问再置 dirty
    pub fn touch(&self, space: SpaceId, va: VirtAddr, write: bool) {
        if let Some(pte) = self.ptes.lock().get_mut(&(space, va.floor().as_usize())) {
            pte.accessed = true;
            pte.dirty |= write;
        }
    }

    pub fn mapped_count(&self, space: SpaceId) -> usize {
        self.ptes.lock().keys().filter(|(s, _)| *s == space).count()
    }

    fn update(&self, space: SpaceId, va: VirtAddr, f: impl FnOnce(&mut Pte)) {
        if let Some(pte) = self.ptes.lock().get_mut(&(space, va.as_usize())) {
            f(pte);
        }
    }

    fn flag(&self, space: SpaceId, va: VirtAddr, f: impl FnOnce(&Pte) -> bool) -> bool {
        self.ptes.lock().get(&(space, va.as_usize())).map_or(false, f)
    }
}

impl Mmu for SoftMmu {
    fn map(&mut self, space: SpaceId, va: VirtAddr, pa: PhysAddr, writable: bool) -> Result<(), MapError> {
        let failing = self
            .map_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(MapError::OutOfMemory);
        }
        let mut ptes = self.ptes.lock();
        if ptes.contains_key(&(space, va.as_usize())) {
            return Err(MapError::AlreadyMapped);
        }
        ptes.insert(
            (space, va.as_usize()),
            Pte {
                pa,
                writable,
                accessed: false,
                dirty: false,
            },
        );
        Ok(())
    }

    fn unmap(&mut self, space: SpaceId, va: VirtAddr) {
        self.ptes.lock().remove(&(space, va.as_usize()));
    }

    fn is_dirty(&self, space: SpaceId, va: VirtAddr) -> bool {
        self.flag(space, va, |p| p.dirty)
    }

    fn set_dirty(&mut self, space: SpaceId, va: VirtAddr, dirty: bool) {
        self.update(space, va, |p| p.dirty = dirty);
    }

    fn is_accessed(&self, space: SpaceId, va: VirtAddr) -> bool {
        self.flag(space, va, |p| p.accessed)
    }

    fn clear_accessed(&mut self, space: SpaceId, va: VirtAddr) {
        self.update(space, va, |p| p.accessed = false);
    }

    fn destroy(&mut self, space: SpaceId) {
        self.ptes.lock().retain(|(s, _), _| *s != space);
    }
}

// ============================================================
// 交换设备
// ============================================================

pub struct RamDisk {
    data: Vec<u8>,
    writes: Arc<AtomicUsize>,
}

impl RamDisk {
    pub fn with_slots(slots: usize) -> Self {
        Self {
            data: vec![0u8; slots * SECTORS_PER_SLOT * SECTOR_SIZE],
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl BlockDevice for RamDisk {
    fn sector_count(&self) -> usize {
        self.data.len() / SECTOR_SIZE
    }

    fn read_sector(&mut self, sector: usize, buf: &mut [u8]) {
        let start = sector * SECTOR_SIZE;
        buf.copy_from_slice(&self.data[start..start + SECTOR_SIZE]);
    }

    fn write_sector(&mut self, sector: usize, buf: &[u8]) {
        let start = sector * SECTOR_SIZE;
        self.data[start..start + SECTOR_SIZE].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================
// 内存文件
// ============================================================

#[derive(Default)]
struct FileState {
    data: Vec<u8>,
    reads: usize,
    writes: Vec<(usize, Vec<u8>)>,
    opens: usize,
    closes: usize,
}

/// 一个打开的内存文件描述，多个描述共享内容
pub struct MemFile {
    state: Arc<Mutex<FileState>>,
}

impl VmFile for MemFile {
    fn read_at(&mut self, buf: &mut [u8], offset: usize) -> usize {
        let mut st = self.state.lock();
        st.reads += 1;
        if offset >= st.data.len() {
            return 0;
        }
        let n = buf.len().min(st.data.len() - offset);
        buf[..n].copy_from_slice(&st.data[offset..offset + n]);
        n
    }

    /// 不扩展文件
    fn write_at(&mut self, buf: &[u8], offset: usize) -> usize {
        let mut st = self.state.lock();
        if offset >= st.data.len() {
            return 0;
        }
        let n = buf.len().min(st.data.len() - offset);
        st.data[offset..offset + n].copy_from_slice(&buf[..n]);
        st.writes.push((offset, buf[..n].to_vec()));
        n
    }

    fn length(&self) -> usize {
        self.state.lock().data.len()
    }

    fn reopen(&self) -> Option<Box<dyn VmFile>> {
        self.state.lock().opens += 1;
        Some(Box::new(MemFile {
            state: self.state.clone(),
        }))
    }

    fn close(self: Box<Self>) {
        self.state.lock().closes += 1;
    }
}

/// 从测试一侧观察内存文件
#[derive(Clone)]
pub struct FileLog {
    state: Arc<Mutex<FileState>>,
}

impl FileLog {
    pub fn data(&self) -> Vec<u8> {
        self.state.lock().data.clone()
    }

    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// (偏移, 写入内容)
    pub fn write_log(&self) -> Vec<(usize, Vec<u8>)> {
        self.state.lock().writes.clone()
    }

    pub fn opens(&self) -> usize {
        self.state.lock().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }
}

/// 以 `contents` 为内容打开一个内存文件
pub fn mem_file(contents: &[u8]) -> (FileHandle, FileLog) {
    let state = Arc::new(Mutex::new(FileState {
        data: contents.to_vec(),
        opens: 1,
        ..FileState::default()
    }));
    let file = MemFile {
        state: state.clone(),
    };
    (FileHandle::new(Box::new(file)), FileLog { state })
}

/// 第 i 个字节为 `(i * 7 + seed) as u8` 的测试内容
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

// ============================================================
// 用户态访问
// ============================================================

/// 虚拟内存加上一个模拟的 CPU：读写先查软件页表，缺页时调用缺页处理
pub struct Machine {
    pub vm: Vm,
    pub mmu: SoftMmu,
    /// 用户栈指针
    pub rsp: usize,
}

impl Machine {
    pub fn new(frames: usize, swap_slots: usize) -> Self {
        let mmu = SoftMmu::default();
        let vm = Vm::new(
            Box::new(RamPool::new(frames)),
            Box::new(mmu.clone()),
            Box::new(RamDisk::with_slots(swap_slots)),
        );
        Self {
            vm,
            mmu,
            rsp: USER_STACK_TOP,
        }
    }

    /// 访问 `addr` 所在页，必要时处理缺页
    pub fn access(&mut self, space: SpaceId, addr: usize, write: bool) -> Result<(), VmError> {
        let va = VirtAddr::new(addr);
        for _ in 0..2 {
            match self.mmu.translate(space, va) {
                Some(pte) if write && !pte.writable => {
                    let flags = FaultFlags::from_parts(true, true, false);
                    self.vm.handle_page_fault(space, va, flags, self.rsp)?;
                    panic!("write to read-only page {:#x} was allowed", addr);
                }
                Some(_) => {
                    self.mmu.touch(space, va, write);
                    return Ok(());
                }
                None => {
                    let flags = FaultFlags::from_parts(true, write, true);
                    self.vm.handle_page_fault(space, va, flags, self.rsp)?;
                }
            }
        }
        panic!("fault at {:#x} did not map the page", addr);
    }

    /// 写用户内存，可以跨页
    pub fn store(&mut self, space: SpaceId, addr: usize, bytes: &[u8]) -> Result<(), VmError> {
        let mut done = 0;
        while done < bytes.len() {
            let a = addr + done;
            let off = a % PAGE_SIZE;
            let n = (PAGE_SIZE - off).min(bytes.len() - done);
            self.access(space, a, true)?;
            let page = self
                .vm
                .page_bytes_mut(space, VirtAddr::new(a))
                .expect("page resident after access");
            page[off..off + n].copy_from_slice(&bytes[done..done + n]);
            done += n;
        }
        Ok(())
    }

    /// 读用户内存，可以跨页
    pub fn load(&mut self, space: SpaceId, addr: usize, len: usize) -> Result<Vec<u8>, VmError> {
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let a = addr + out.len();
            let off = a % PAGE_SIZE;
            let n = (PAGE_SIZE - off).min(len - out.len());
            self.access(space, a, false)?;
            let page = self
                .vm
                .page_bytes(space, VirtAddr::new(a))
                .expect("page resident after access");
            out.extend_from_slice(&page[off..off + n]);
        }
        Ok(out)
    }
}

#[test]
fn test_global_instances() {
    // 全局实例只能创建一次，其余测试都使用自己构造的对象
    let opts = crate::boot("-o mlfqs");
    assert!(opts.mlfqs);
    assert_eq!(crate::sched::with_scheduler(|s| s.current()), Some(1));
    assert_eq!(crate::sched::with_scheduler(|s| s.is_mlfqs()), Some(true));

    let m = Machine::new(4, 4);
    crate::mm::init(m.vm);
    let space = crate::mm::with_vm(|vm| vm.create_space());
    assert!(space.is_some());
}

#[test]
#[should_panic(expected = "page 0x100000 released twice")]
fn test_pool_catches_double_release() {
    let mut pool = RamPool::new(1);
    let pa = pool.acquire_page(true).unwrap();
    pool.release_page(pa);
    pool.release_page(pa);
}
