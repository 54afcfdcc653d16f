use crate::config::{MatchType, RuleActionConfig, RuleConfig};
use crate::error::ConfigError;
use crate::metrics::{
    frontend_counter_name, frontend_counter_name_for, rule_counter_name, CounterRegistry,
};
use crate::r#const::router::wildcards;
use crate::types::{rcode_label, DnsResponse, Frontend, Provenance};
use hickory_proto::op::{Message, MessageType, ResponseCode};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

// 编译后的规则选择器
// 选择器是对查询名称的纯谓词，不产生副作用
enum RuleMatcher {
    // 精确匹配
    Exact(String),
    // 后缀通配符匹配（*.domain.tld，同时覆盖domain.tld本身）
    Suffix(String),
    // 全局通配符（*）
    Global,
    // 正则表达式匹配
    Regex(Regex),
}

impl RuleMatcher {
    // 判断域名是否命中选择器
    fn matches(&self, domain: &str) -> bool {
        match self {
            RuleMatcher::Exact(pattern) => domain == pattern,
            RuleMatcher::Suffix(suffix) => {
                domain == suffix
                    || (domain.len() > suffix.len()
                        && domain.ends_with(suffix)
                        && domain.as_bytes()[domain.len() - suffix.len() - 1] == b'.')
            }
            RuleMatcher::Global => true,
            RuleMatcher::Regex(regex) => regex.is_match(domain),
        }
    }
}

// 编译后的规则动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleAction {
    // 合成指定响应码的响应并终止评估
    Synthesize(ResponseCode),
    // 将查询路由到指定池
    Route(String),
}

// 编译后的规则
struct CompiledRule {
    // 规则名称，用于 rule-<name> 计数器
    name: String,
    // 选择器
    matcher: RuleMatcher,
    // 动作
    action: RuleAction,
}

// 规则评估结果
#[derive(Debug, Clone)]
pub enum Verdict {
    // 规则合成了响应（附带命中的规则名称）
    Synthesized(DnsResponse, String),
    // 查询被路由到池，由后端协作方解析
    Routed(String),
}

// 规则引擎
//
// 按配置顺序评估规则，第一条命中的规则生效后立即停止评估（短路）。
// 规则在启动时编译完成，服务期间只读
pub struct RuleEngine {
    // 按配置顺序排列的规则
    rules: Vec<CompiledRule>,
    // 无规则命中时的默认池
    default_pool: String,
    // 计数器注册表
    registry: Arc<CounterRegistry>,
}

impl RuleEngine {
    // 从规则配置构建规则引擎
    pub fn new(
        rules: Vec<RuleConfig>,
        default_pool: String,
        registry: Arc<CounterRegistry>,
    ) -> Result<Self, ConfigError> {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            let matcher = Self::compile_matcher(&rule)?;

            let action = match rule.action {
                RuleActionConfig::Nxdomain => RuleAction::Synthesize(ResponseCode::NXDomain),
                RuleActionConfig::Refused => RuleAction::Synthesize(ResponseCode::Refused),
                RuleActionConfig::Servfail => RuleAction::Synthesize(ResponseCode::ServFail),
                RuleActionConfig::Pool => {
                    let pool = rule.pool.clone().ok_or_else(|| {
                        ConfigError::InvalidRule(format!(
                            "rule '{}' with pool action is missing a pool target",
                            rule.name
                        ))
                    })?;
                    RuleAction::Route(pool)
                }
            };

            // 预先声明规则计数器，让它在任何流量之前就出现在快照中
            registry.declare(&rule_counter_name(&rule.name));

            compiled.push(CompiledRule {
                name: rule.name,
                matcher,
                action,
            });
        }

        debug!("Compiled {} rules", compiled.len());

        Ok(Self {
            rules: compiled,
            default_pool,
            registry,
        })
    }

    // 编译规则选择器
    fn compile_matcher(rule: &RuleConfig) -> Result<RuleMatcher, ConfigError> {
        let pattern = rule.pattern.trim_end_matches('.').to_lowercase();

        match rule.match_type {
            MatchType::Exact => Ok(RuleMatcher::Exact(pattern)),
            MatchType::Wildcard => {
                if pattern == wildcards::GLOBAL {
                    Ok(RuleMatcher::Global)
                } else if let Some(suffix) = pattern.strip_prefix(wildcards::PREFIX) {
                    if suffix.is_empty() {
                        return Err(ConfigError::InvalidPattern(rule.pattern.clone()));
                    }
                    Ok(RuleMatcher::Suffix(suffix.to_string()))
                } else {
                    Err(ConfigError::InvalidPattern(rule.pattern.clone()))
                }
            }
            MatchType::Regex => Ok(RuleMatcher::Regex(Regex::new(&rule.pattern)?)),
        }
    }

    // 评估查询
    //
    // 命中的规则增加 rule-<name> 计数器。合成动作额外增加
    // frontend-<rcode> 和 frontend-<frontend>-<rcode>，REFUSED除外
    // （REFUSED被明确豁免于前端级计数）。路由动作本身不增加前端计数，
    // 后端响应的计数由前端计数组件在完成时驱动
    pub fn evaluate(&self, query: &Message, frontend: Frontend) -> Verdict {
        // 将查询名称转换为小写并去掉末尾的点，便于匹配
        let domain = match query.queries().first() {
            Some(q) => {
                let mut name = q.name().to_string().to_lowercase();
                if name.ends_with('.') {
                    name.pop();
                }
                name
            }
            None => String::new(),
        };

        for rule in &self.rules {
            if !rule.matcher.matches(&domain) {
                continue;
            }

            // 第一条命中的规则生效，停止评估
            self.registry.increment(&rule_counter_name(&rule.name));

            match &rule.action {
                RuleAction::Synthesize(rcode) => {
                    debug!(
                        "Rule match: '{}' -> synthesize {:?} for {}",
                        rule.name, rcode, domain
                    );

                    if *rcode != ResponseCode::Refused {
                        let label = rcode_label(*rcode);
                        self.registry.increment(&frontend_counter_name(label));
                        self.registry
                            .increment(&frontend_counter_name_for(frontend, label));
                    }

                    let response = synthesize_response(query, *rcode);
                    return Verdict::Synthesized(
                        DnsResponse::new(response, Provenance::RuleSynthesized),
                        rule.name.clone(),
                    );
                }
                RuleAction::Route(pool) => {
                    debug!("Rule match: '{}' -> pool '{}' for {}", rule.name, pool, domain);
                    return Verdict::Routed(pool.clone());
                }
            }
        }

        // 无规则命中，路由到默认池
        Verdict::Routed(self.default_pool.clone())
    }
}

// 从查询合成响应
//
// 响应携带配置的响应码、空的答案部分、查询的问题部分和事务ID。
// RA标志被强制设为与查询的RD标志相同：合成响应把RD镜像进RA，
// 而不是使用常规的RA语义，这是固定的可观测契约
pub fn synthesize_response(query: &Message, rcode: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(query.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(query.op_code());
    response.set_response_code(rcode);
    response.set_recursion_desired(query.recursion_desired());
    response.set_recursion_available(query.recursion_desired());

    // 复制查询部分到响应
    for query in query.queries() {
        response.add_query(query.clone());
    }

    response
}
