use crate::metrics::{
    frontend_counter_name, frontend_counter_name_for, CounterRegistry,
};
use crate::r#const::counter_names;
use crate::types::{rcode_label, DnsResponse, Frontend, Provenance};
use hickory_proto::op::ResponseCode;
use std::sync::Arc;
use tracing::debug;

// 前端计数组件
//
// 每个事务无论响应来源如何，在完成时恰好被记录一次。
// 客户端在途中断开不会回滚已提交的计数：计数和缓存副作用在
// 相应组件动作时即提交，不等待最终响应送达
pub struct FrontendAccounting {
    // 计数器注册表
    registry: Arc<CounterRegistry>,
}

impl FrontendAccounting {
    // 创建前端计数组件
    pub fn new(registry: Arc<CounterRegistry>) -> Self {
        Self { registry }
    }

    // 记录一次已完成的事务
    //
    // 总是增加 responses。对缓存命中和后端来源的响应，按响应码增加
    // frontend-<rcode> 和 frontend-<frontend>-<rcode>（规则合成的响应
    // 已经在合成时由规则引擎归属，这里不再重复）。只有后端来源的
    // SERVFAIL才会增加 servfail-responses：规则合成的SERVFAIL永远
    // 不计入该计数器
    pub fn record_completion(&self, frontend: Frontend, response: &DnsResponse) {
        self.registry.increment(counter_names::RESPONSES);

        if response.provenance != Provenance::RuleSynthesized {
            let label = rcode_label(response.rcode());
            self.registry.increment(&frontend_counter_name(label));
            self.registry
                .increment(&frontend_counter_name_for(frontend, label));
        }

        if response.provenance == Provenance::Backend
            && response.rcode() == ResponseCode::ServFail
        {
            self.registry.increment(counter_names::SERVFAIL_RESPONSES);
        }

        debug!(
            "Recorded completion on {} - rcode: {:?}, provenance: {:?}",
            frontend.label(),
            response.rcode(),
            response.provenance
        );
    }
}
