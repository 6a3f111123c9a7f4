//! 解释需求采样
//!
//! 以 1/4 概率返回 true，每次独立。作为「是否打断用户」的占位策略保留，
//! 目前两个传输绑定都不调用。

use rand::Rng;

/// 使用线程本地随机源采样
pub fn explanation_needed() -> bool {
    explanation_needed_with(&mut rand::thread_rng())
}

/// 使用指定随机源采样（便于固定种子测试）
pub fn explanation_needed_with<R: Rng>(rng: &mut R) -> bool {
    rng.gen_ratio(1, 4)
}
