//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!

//! 内核命令行参数解析
//!
//! 对应 Linux 的 cmdline parsing (kernel/params.c)。执行核心只关心一个
//! 启动期开关：调度模式。以下三种写法都会选中 MLFQS：
//!
//! - `-o mlfqs`（教学内核的传统写法）
//! - `mlfqs`
//! - `mlfqs=1`
//!
//! `mlfqs=0` 显式关闭；没有出现时使用 `config::MLFQS`。

use crate::config;

/// 启动选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootOptions {
    /// 是否使用多级反馈队列调度（与优先级捐赠互斥）
    pub mlfqs: bool,
}

impl Default for BootOptions {
    fn default() -> Self {
        Self { mlfqs: config::MLFQS }
    }
}

impl BootOptions {
    /// 解析命令行
    ///
    /// 空命令行回退到 `config::DEFAULT_CMDLINE`。不认识的参数忽略。
    pub fn parse(cmdline: &str) -> Self {
        let cmdline = if cmdline.trim().is_empty() {
            config::DEFAULT_CMDLINE
        } else {
            cmdline
        };

        let mut opts = Self::default();
        let mut tokens = cmdline.split_whitespace();
        while let Some(token) = tokens.next() {
            match token {
                "-o" => {
                    if tokens.next() == Some("mlfqs") {
                        opts.mlfqs = true;
                    }
                }
                "mlfqs" => opts.mlfqs = true,
                _ => {
                    if let Some(value) = get_value(token, "mlfqs") {
                        match value {
                            "1" | "on" | "true" => opts.mlfqs = true,
                            "0" | "off" | "false" => opts.mlfqs = false,
                            _ => log::warn!("cmdline: bad value for mlfqs: {}", value),
                        }
                    }
                }
            }
        }
        opts
    }
}

/// `key=value` 形式的参数取值
fn get_value<'a>(token: &'a str, key: &str) -> Option<&'a str> {
    let idx = token.find('=')?;
    if &token[..idx] == key {
        Some(&token[idx + 1..])
    } else {
        None
    }
}
