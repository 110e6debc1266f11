//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 测试：内存映射文件

use super::{mem_file, pattern, Machine};
use crate::config::{KERNEL_BASE, PAGE_SIZE};
use crate::mm::{VirtAddr, VmError, VmType};

const MAP: usize = 0x2000_0000;

fn map_addr() -> VirtAddr {
    VirtAddr::new(MAP)
}

#[test]
fn test_munmap_writes_back_dirty_page() {
    let mut m = Machine::new(8, 4);
    let space = m.vm.create_space();
    let contents = pattern(PAGE_SIZE + 500, 5);
    let (file, io) = mem_file(&contents);

    let addr = m.vm.mmap(space, map_addr(), contents.len(), true, &file, 0).unwrap();
    assert_eq!(addr, map_addr());
    assert_eq!(m.vm.spt(space).unwrap().len(), 2);
    assert_eq!(m.vm.page(space, addr).unwrap().vm_type(), VmType::File);
    assert_eq!(io.reads(), 0);

    assert_eq!(m.load(space, MAP + 10, 3).unwrap(), &contents[10..13]);
    m.store(space, MAP + 10, &[0xaa, 0xbb, 0xcc]).unwrap();
    m.vm.munmap(space, addr).unwrap();

    let mut expected = contents.clone();
    expected[10..13].copy_from_slice(&[0xaa, 0xbb, 0xcc]);
    assert_eq!(io.data(), expected);
    // 只写回了被写过的那一页
    let log = io.write_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].0, 0);
    assert_eq!(log[0].1, &expected[..PAGE_SIZE]);

    assert!(m.vm.spt(space).unwrap().is_empty());
    assert_eq!(m.vm.frames_in_use(), 0);
    assert_eq!(m.mmu.mapped_count(space), 0);
    assert_eq!(m.vm.stats().write_backs, 1);
}

#[test]
fn test_clean_page_unmaps_without_io() {
    let mut m = Machine::new(8, 4);
    let space = m.vm.create_space();
    let (file, io) = mem_file(&pattern(3 * PAGE_SIZE, 1));

    m.vm.mmap(space, map_addr(), 3 * PAGE_SIZE, true, &file, 0).unwrap();
    m.load(space, MAP + PAGE_SIZE, 16).unwrap();
    m.vm.munmap(space, map_addr()).unwrap();
    assert!(io.write_log().is_empty());
    assert_eq!(io.reads(), 1);
}

#[test]
fn test_mapping_outlives_callers_handle() {
    let mut m = Machine::new(8, 4);
    let space = m.vm.create_space();
    let contents = pattern(PAGE_SIZE, 9);
    let (file, io) = mem_file(&contents);

    m.vm.mmap(space, map_addr(), PAGE_SIZE, false, &file, 0).unwrap();
    assert_eq!(io.opens(), 2);
    drop(file);
    assert_eq!(io.closes(), 1);

    assert_eq!(m.load(space, MAP, PAGE_SIZE).unwrap(), contents);
    assert_eq!(m.store(space, MAP, &[0]), Err(VmError::WriteProtected));
    m.vm.munmap(space, map_addr()).unwrap();
    assert_eq!(io.closes(), 2);
}

#[test]
fn test_offset_and_tail() {
    let mut m = Machine::new(8, 4);
    let space = m.vm.create_space();
    let contents = pattern(PAGE_SIZE + 100, 2);
    let (file, io) = mem_file(&contents);

    // 从第二页开始映射，文件只剩 100 字节，其余读作 0
    m.vm.mmap(space, map_addr(), PAGE_SIZE, true, &file, PAGE_SIZE).unwrap();
    let data = m.load(space, MAP, PAGE_SIZE).unwrap();
    assert_eq!(&data[..100], &contents[PAGE_SIZE..]);
    assert!(data[100..].iter().all(|&b| b == 0));

    // 文件末尾之后的写不会扩展文件
    m.store(space, MAP + 2000, &[7; 8]).unwrap();
    m.store(space, MAP + 1, &[7]).unwrap();
    m.vm.munmap(space, map_addr()).unwrap();

    let log = io.write_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].0, PAGE_SIZE);
    assert_eq!(log[0].1.len(), 100);
    assert_eq!(io.data().len(), PAGE_SIZE + 100);
    assert_eq!(io.data()[PAGE_SIZE + 1], 7);
}

#[test]
fn test_eviction_writes_back_and_reloads() {
    let mut m = Machine::new(1, 4);
    let space = m.vm.create_space();
    let (file, io) = mem_file(&pattern(2 * PAGE_SIZE, 4));

    m.vm.mmap(space, map_addr(), 2 * PAGE_SIZE, true, &file, 0).unwrap();
    m.store(space, MAP, b"dirty").unwrap();
    m.load(space, MAP + PAGE_SIZE, 1).unwrap();

    // 文件页换出时写回文件，不占用交换区
    assert_eq!(io.write_log().len(), 1);
    assert_eq!(m.vm.swap().used(), 0);
    assert!(!m.vm.page(space, map_addr()).unwrap().is_resident());

    assert_eq!(m.load(space, MAP, 5).unwrap(), b"dirty");
    // 干净的第二页被换出时直接丢弃
    assert_eq!(io.write_log().len(), 1);
    assert_eq!(m.vm.stats().write_backs, 1);
}

#[test]
fn test_exit_writes_back_mappings() {
    let mut m = Machine::new(8, 4);
    let space = m.vm.create_space();
    let (file, io) = mem_file(&pattern(PAGE_SIZE, 0));
    m.vm.mmap(space, map_addr(), PAGE_SIZE, true, &file, 0).unwrap();
    m.store(space, MAP + 100, &[1, 2]).unwrap();
    drop(file);

    m.vm.destroy_address_space(space).unwrap();
    assert_eq!(&io.data()[100..102], &[1, 2]);
    assert_eq!(io.closes(), 2);
}

#[test]
fn test_invalid_requests_map_nothing() {
    let mut m = Machine::new(8, 4);
    let space = m.vm.create_space();
    let (file, _) = mem_file(&pattern(2 * PAGE_SIZE, 0));
    let (empty, _) = mem_file(&[]);
    m.vm.alloc_anon_page(space, VirtAddr::new(MAP + PAGE_SIZE), true).unwrap();

    let bad = [
        m.vm.mmap(space, VirtAddr::new(0), PAGE_SIZE, true, &file, 0),
        m.vm.mmap(space, VirtAddr::new(MAP + 1), PAGE_SIZE, true, &file, 0),
        m.vm.mmap(space, map_addr(), 0, true, &file, 0),
        m.vm.mmap(space, map_addr(), PAGE_SIZE, true, &file, 100),
        m.vm.mmap(space, map_addr(), PAGE_SIZE, true, &empty, 0),
        m.vm.mmap(space, VirtAddr::new(KERNEL_BASE - PAGE_SIZE), 2 * PAGE_SIZE, true, &file, 0),
    ];
    for result in bad {
        assert_eq!(result, Err(VmError::InvalidArgument));
    }
    // 第二页与已有的匿名页重叠
    assert_eq!(
        m.vm.mmap(space, map_addr(), 2 * PAGE_SIZE, true, &file, 0),
        Err(VmError::AlreadyMapped)
    );
    assert_eq!(m.vm.spt(space).unwrap().len(), 1);
    assert_eq!(m.vm.munmap(space, map_addr()), Err(VmError::NotMapped));
}
