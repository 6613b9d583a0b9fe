//! di-impl 跨 crate 场景测试
//!
//! 测试位于 `tests/` 目录，按主题拆分：注册、解析、生命周期、根容器。
