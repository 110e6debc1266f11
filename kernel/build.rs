//! Rux 执行核心构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Kernel.toml 配置文件（也接受 menuconfig 生成的 build/.config）
//! 2. 生成配置代码到 OUT_DIR/config.rs
//! 3. 导出内核名称/版本环境变量

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// 解析 build/.config 文件（简单 key=value 格式）
fn parse_dot_config(content: &str) -> toml::Value {
    let mut sections: HashMap<String, toml::map::Map<String, toml::Value>> = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // 跳过注释和空行
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // 解析 section_key=value 格式
        if let Some(eq_pos) = line.find('=') {
            let key = &line[..eq_pos];
            let value = line[eq_pos + 1..].trim();

            // 分割 section_key（使用第一个下划线分割）
            if let Some(underscore_pos) = key.find('_') {
                let section = &key[..underscore_pos];
                let config_key = &key[underscore_pos + 1..];

                let parsed_value = if value == "true" {
                    toml::Value::Boolean(true)
                } else if value == "false" {
                    toml::Value::Boolean(false)
                } else if let Ok(int_val) = value.parse::<i64>() {
                    toml::Value::Integer(int_val)
                } else {
                    toml::Value::String(value.trim_matches('"').to_string())
                };

                sections
                    .entry(section.to_string())
                    .or_default()
                    .insert(config_key.to_string(), parsed_value);
            }
        }
    }

    let mut root_map = toml::map::Map::new();
    for (section_name, section_data) in sections {
        root_map.insert(section_name, toml::Value::Table(section_data));
    }
    toml::Value::Table(root_map)
}

fn get_int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn get_bool(config: &toml::Value, section: &str, key: &str, default: bool) -> bool {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_bool())
        .unwrap_or(default)
}

fn get_str<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

fn main() {
    println!("cargo:rerun-if-changed=../Kernel.toml");
    println!("cargo:rerun-if-changed=../build/.config");

    // 优先读取 build/.config（menuconfig 生成的配置），否则回退到 Kernel.toml
    let config_content = fs::read_to_string("../build/.config")
        .or_else(|_| fs::read_to_string("../Kernel.toml"))
        .unwrap_or_default();

    // 判断配置文件类型：检查是否有 TOML 的 [section] 格式
    let is_toml = config_content.trim().is_empty()
        || config_content.lines().any(|line| {
            let trimmed = line.trim();
            trimmed.starts_with('[') && trimmed.ends_with(']')
        });

    let config: toml::Value = if is_toml {
        toml::from_str(&config_content).expect("Kernel.toml 解析失败")
    } else {
        parse_dot_config(&config_content)
    };

    let name = get_str(&config, "general", "name", "Rux");
    let version = get_str(&config, "general", "version", "0.1.0");
    println!("cargo:rustc-env=CARGO_KERNEL_NAME={}", name);
    println!("cargo:rustc-env=CARGO_KERNEL_VERSION={}", version);

    generate_config_code(&config, name, version);
}

fn generate_config_code(config: &toml::Value, name: &str, version: &str) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR 未设置"));

    let page_size = get_int(config, "memory", "page_size", 4096);
    assert!(
        page_size > 0 && (page_size & (page_size - 1)) == 0,
        "memory.page_size 必须是 2 的幂"
    );
    let sector_size = get_int(config, "swap", "sector_size", 512);
    assert!(
        sector_size > 0 && page_size % sector_size == 0,
        "swap.sector_size 必须整除 page_size"
    );

    let config_code = format!(
        r#"// Rux 执行核心配置（自动生成）
//
// 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

/// 内核名称
pub const KERNEL_NAME: &str = "{name}";

/// 内核版本
pub const KERNEL_VERSION: &str = "{version}";

/// 定时器中断频率 (Hz)
pub const TIMER_FREQ: u64 = {timer_freq};

/// 时间片滴答数
pub const TIME_SLICE: u32 = {time_slice};

/// 线程控制块池大小
pub const MAX_THREADS: usize = {max_threads};

/// 默认是否启用 MLFQS
pub const MLFQS: bool = {mlfqs};

/// 默认内核命令行
pub const DEFAULT_CMDLINE: &str = "{cmdline}";

/// 页大小
pub const PAGE_SIZE: usize = {page_size};

/// 页大小位移
pub const PAGE_SHIFT: usize = {page_shift};

/// 用户栈顶地址
pub const USER_STACK_TOP: usize = {stack_top:#x};

/// 栈增长上限（字节）
pub const STACK_LIMIT: usize = {stack_limit};

/// 内核地址空间起点
pub const KERNEL_BASE: usize = {kernel_base:#x};

/// 交换设备扇区大小
pub const SECTOR_SIZE: usize = {sector_size};
"#,
        name = name,
        version = version,
        timer_freq = get_int(config, "scheduler", "timer_freq", 100),
        time_slice = get_int(config, "scheduler", "time_slice_ticks", 4),
        max_threads = get_int(config, "scheduler", "max_threads", 64),
        mlfqs = get_bool(config, "scheduler", "mlfqs", false),
        cmdline = get_str(config, "scheduler", "default_cmdline", "").escape_default(),
        page_size = page_size,
        page_shift = page_size.trailing_zeros(),
        stack_top = get_int(config, "memory", "user_stack_top", 0x4747_8000),
        stack_limit = get_int(config, "memory", "stack_limit", 1 << 20),
        kernel_base = get_int(config, "memory", "kernel_base", 0x8004_0000_0000),
        sector_size = sector_size,
    );

    let config_file = out_dir.join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_code {
        fs::write(&config_file, &config_code).expect("写入配置文件失败");
    }
}
