//! 故障源：每次调用返回成功 / 失败
//!
//! 测试用确定性的 ScriptedFaults；CLI 演示管道用 RandomFaults 模拟真实环境的偶发失败。

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::Rng;

/// 可注入的故障源
pub trait FaultSource: Send + Sync {
    /// 本次调用是否成功
    fn next_ok(&self) -> bool;
}

/// 永远成功
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSucceed;

impl FaultSource for AlwaysSucceed {
    fn next_ok(&self) -> bool {
        true
    }
}

/// 永远失败
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysFail;

impl FaultSource for AlwaysFail {
    fn next_ok(&self) -> bool {
        false
    }
}

/// 按脚本依次返回结果；脚本耗尽后返回 `exhausted`
#[derive(Debug)]
pub struct ScriptedFaults {
    script: Mutex<VecDeque<bool>>,
    exhausted: bool,
}

impl ScriptedFaults {
    pub fn new(script: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            exhausted: true,
        }
    }

    /// 脚本耗尽后的返回值（默认 true）
    pub fn then(mut self, exhausted: bool) -> Self {
        self.exhausted = exhausted;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl FaultSource for ScriptedFaults {
    fn next_ok(&self) -> bool {
        match self.script.lock() {
            Ok(mut script) => script.pop_front().unwrap_or(self.exhausted),
            Err(_) => self.exhausted,
        }
    }
}

/// 以给定概率成功的随机故障源
#[derive(Debug, Clone, Copy)]
pub struct RandomFaults {
    success_probability: f64,
}

impl RandomFaults {
    pub fn new(success_probability: f64) -> Self {
        Self {
            success_probability: success_probability.clamp(0.0, 1.0),
        }
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }
}

impl FaultSource for RandomFaults {
    fn next_ok(&self) -> bool {
        rand::thread_rng().gen_bool(self.success_probability)
    }
}
