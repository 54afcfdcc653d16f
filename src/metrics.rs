use crate::r#const::counter_names;
use crate::types::Frontend;
use prometheus::{opts, IntCounterVec, Registry};
use std::collections::BTreeMap;

// 规则计数器名称: rule-<ruleName>
pub fn rule_counter_name(rule_name: &str) -> String {
    format!("{}{}", counter_names::RULE_PREFIX, rule_name)
}

// 聚合前端计数器名称: frontend-<rcode>
pub fn frontend_counter_name(rcode_label: &str) -> String {
    format!("{}{}", counter_names::FRONTEND_PREFIX, rcode_label)
}

// 单个前端计数器名称: frontend-<frontend>-<rcode>
pub fn frontend_counter_name_for(frontend: Frontend, rcode_label: &str) -> String {
    format!(
        "{}{}-{}",
        counter_names::FRONTEND_PREFIX,
        frontend.label(),
        rcode_label
    )
}

// 进程级命名计数器注册表
//
// 所有组件（缓存、规则引擎、前端计数）都把计数器增量写入这里。
// 计数器是单调递增的64位整数，只在进程重启时归零，64位不考虑回绕。
// 每个实例持有独立的 prometheus Registry，通过构造注入到各组件，
// 便于在测试中创建隔离实例
pub struct CounterRegistry {
    registry: Registry,

    // 所有命名计数器，以 name 标签区分
    counters: IntCounterVec,
}

impl Default for CounterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterRegistry {
    // 创建新的计数器注册表
    pub fn new() -> Self {
        let registry = Registry::new();

        let counters = IntCounterVec::new(
            opts!(
                "loadgate_counters_total",
                "Monotonic named counters (rule-*, frontend-*, cache-hits, cache-misses, responses, servfail-responses)"
            ),
            &["name"],
        )
        .unwrap();

        registry.register(Box::new(counters.clone())).unwrap();

        let metrics = CounterRegistry { registry, counters };

        // 预先声明固定名称的计数器，保证快照中始终可见
        metrics.declare(counter_names::RESPONSES);
        metrics.declare(counter_names::SERVFAIL_RESPONSES);
        metrics.declare(counter_names::CACHE_HITS);
        metrics.declare(counter_names::CACHE_MISSES);

        metrics
    }

    // 声明一个计数器（首次使用时创建并归零）
    pub fn declare(&self, name: &str) {
        let _ = self.counters.with_label_values(&[name]);
    }

    // 增加计数器的值（首次使用时创建并归零后累加）
    // 永远不会失败，也不会变为负数
    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    // 按指定增量增加计数器的值
    // 对同一计数器的并发更新是串行化的（读-改-写为原子操作）
    pub fn increment_by(&self, name: &str, delta: u64) {
        self.counters.with_label_values(&[name]).inc_by(delta);
    }

    // 读取单个计数器的当前值（未声明的计数器视为0）
    pub fn value(&self, name: &str) -> u64 {
        self.counters.with_label_values(&[name]).get()
    }

    // 获取所有计数器的一致性快照
    //
    // 每个计数器的值都是精确的；跨计数器的同时性只保证"不丢失更新"，
    // 独立计数器之间的更新顺序不做保证
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        let mut stats = BTreeMap::new();

        for family in self.registry.gather() {
            for metric in family.get_metric() {
                let name = metric
                    .get_label()
                    .iter()
                    .find(|l| l.get_name() == "name")
                    .map(|l| l.get_value().to_string());

                if let Some(name) = name {
                    stats.insert(name, metric.get_counter().get_value() as u64);
                }
            }
        }

        stats
    }

    // 获取 Prometheus 注册表
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // 导出所有计数器为 Prometheus 文本格式
    pub fn export_metrics(&self) -> String {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = String::new();
        encoder.encode_utf8(&metric_families, &mut buffer).unwrap();
        buffer
    }
}
