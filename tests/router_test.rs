use assert_matches::assert_matches;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use loadgate::config::{MatchType, RuleActionConfig, RuleConfig};
use loadgate::metrics::CounterRegistry;
use loadgate::router::{RuleEngine, Verdict};
use loadgate::types::Frontend;
use std::str::FromStr;
use std::sync::Arc;

// 辅助函数：创建DNS查询消息
fn build_query(name: &str, rd: bool) -> Message {
    let mut message = Message::new();
    message.set_id(1234);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(rd);
    message.add_query(Query::query(
        Name::from_str(name).expect("Invalid name"),
        RecordType::A,
    ));
    message
}

// 辅助函数：创建规则配置
fn rule(name: &str, match_type: MatchType, pattern: &str, action: RuleActionConfig) -> RuleConfig {
    RuleConfig {
        name: name.to_string(),
        match_type,
        pattern: pattern.to_string(),
        action,
        pool: None,
    }
}

// 辅助函数：创建路由到池的规则配置
fn pool_rule(name: &str, match_type: MatchType, pattern: &str, pool: &str) -> RuleConfig {
    RuleConfig {
        name: name.to_string(),
        match_type,
        pattern: pattern.to_string(),
        action: RuleActionConfig::Pool,
        pool: Some(pool.to_string()),
    }
}

// 辅助函数：创建规则引擎和注册表
fn build_engine(rules: Vec<RuleConfig>) -> (RuleEngine, Arc<CounterRegistry>) {
    let registry = Arc::new(CounterRegistry::new());
    let engine = RuleEngine::new(rules, "default".to_string(), Arc::clone(&registry))
        .expect("Failed to create rule engine");
    (engine, registry)
}

#[test]
fn test_first_match_wins_in_configured_order() {
    // 规则严格按配置顺序评估：先声明的通配符规则优先于
    // 后声明的精确规则，即使后者更具体
    let (engine, registry) = build_engine(vec![
        rule(
            "wild",
            MatchType::Wildcard,
            "*.example.com",
            RuleActionConfig::Nxdomain,
        ),
        rule(
            "exact",
            MatchType::Exact,
            "www.example.com",
            RuleActionConfig::Servfail,
        ),
    ]);

    let query = build_query("www.example.com.", true);
    let verdict = engine.evaluate(&query, Frontend::Udp);

    match verdict {
        Verdict::Synthesized(response, rule_name) => {
            assert_eq!(rule_name, "wild");
            assert_eq!(response.message.response_code(), ResponseCode::NXDomain);
        }
        other => panic!("unexpected verdict: {:?}", other),
    }

    // 只有命中的第一条规则计数，后续规则不再评估
    assert_eq!(registry.value("rule-wild"), 1);
    assert_eq!(registry.value("rule-exact"), 0);
}

#[test]
fn test_synthesized_response_mirrors_rd_into_ra() {
    let (engine, _registry) = build_engine(vec![rule(
        "nxdomain",
        MatchType::Exact,
        "rcode-nxdomain.metrics.tests.example.com",
        RuleActionConfig::Nxdomain,
    )]);

    // RD=0：RA被强制镜像为0（而不是常规的RA语义）
    let query = build_query("rcode-nxdomain.metrics.tests.example.com.", false);
    let verdict = engine.evaluate(&query, Frontend::Udp);
    let response = match verdict {
        Verdict::Synthesized(response, _) => response.message,
        other => panic!("unexpected verdict: {:?}", other),
    };
    assert_eq!(response.id(), query.id());
    assert_eq!(response.message_type(), MessageType::Response);
    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert!(!response.recursion_desired());
    assert!(!response.recursion_available());
    assert_eq!(response.answer_count(), 0);
    assert_eq!(response.queries(), query.queries());

    // RD=1：RA镜像为1
    let query = build_query("rcode-nxdomain.metrics.tests.example.com.", true);
    let verdict = engine.evaluate(&query, Frontend::Tcp);
    let response = match verdict {
        Verdict::Synthesized(response, _) => response.message,
        other => panic!("unexpected verdict: {:?}", other),
    };
    assert!(response.recursion_desired());
    assert!(response.recursion_available());
}

#[test]
fn test_synthesis_attributes_rule_and_frontend_counters() {
    let (engine, registry) = build_engine(vec![rule(
        "servfail",
        MatchType::Exact,
        "rcode-servfail.example.com",
        RuleActionConfig::Servfail,
    )]);

    let query = build_query("rcode-servfail.example.com.", false);
    engine.evaluate(&query, Frontend::Udp);
    engine.evaluate(&query, Frontend::Tcp);

    assert_eq!(registry.value("rule-servfail"), 2);
    assert_eq!(registry.value("frontend-servfail"), 2);
    assert_eq!(registry.value("frontend-udp-servfail"), 1);
    assert_eq!(registry.value("frontend-tcp-servfail"), 1);

    // 规则合成的SERVFAIL不计入后端失败计数器
    assert_eq!(registry.value("servfail-responses"), 0);
}

#[test]
fn test_refused_is_exempt_from_frontend_accounting() {
    let (engine, registry) = build_engine(vec![rule(
        "refused",
        MatchType::Exact,
        "rcode-refused.example.com",
        RuleActionConfig::Refused,
    )]);

    let query = build_query("rcode-refused.example.com.", false);
    let verdict = engine.evaluate(&query, Frontend::Udp);

    assert_matches!(verdict, Verdict::Synthesized(_, _));

    // REFUSED合成增加规则计数器，但被明确豁免于前端级计数
    assert_eq!(registry.value("rule-refused"), 1);
    assert_eq!(registry.value("frontend-refused"), 0);
    assert_eq!(registry.value("frontend-udp-refused"), 0);
}

#[test]
fn test_pool_rule_routes_without_frontend_counters() {
    let (engine, registry) = build_engine(vec![pool_rule(
        "cache",
        MatchType::Wildcard,
        "*.cache.example.com",
        "cache",
    )]);

    let query = build_query("q1.cache.example.com.", true);
    let verdict = engine.evaluate(&query, Frontend::Tls);

    assert_matches!(verdict, Verdict::Routed(pool) if pool == "cache");

    // 路由动作增加规则计数器，但不产生任何前端计数
    assert_eq!(registry.value("rule-cache"), 1);
    let snapshot = registry.snapshot();
    assert!(!snapshot.keys().any(|k| k.starts_with("frontend-")));
}

#[test]
fn test_unmatched_query_routes_to_default_pool() {
    let (engine, registry) = build_engine(vec![rule(
        "nxdomain",
        MatchType::Exact,
        "rcode-nxdomain.example.com",
        RuleActionConfig::Nxdomain,
    )]);

    let query = build_query("unrelated.example.org.", true);
    let verdict = engine.evaluate(&query, Frontend::Udp);

    // 无规则命中时路由到默认池，不增加任何计数器
    assert_matches!(verdict, Verdict::Routed(pool) if pool == "default");
    assert_eq!(registry.value("rule-nxdomain"), 0);
}

#[test]
fn test_matcher_kinds() {
    let (engine, _registry) = build_engine(vec![
        rule(
            "exact",
            MatchType::Exact,
            "one.example.com",
            RuleActionConfig::Nxdomain,
        ),
        rule(
            "suffix",
            MatchType::Wildcard,
            "*.sub.example.com",
            RuleActionConfig::Servfail,
        ),
        rule(
            "regex",
            MatchType::Regex,
            "^(api|service)\\..+\\.net$",
            RuleActionConfig::Refused,
        ),
    ]);

    // 精确匹配不区分大小写，忽略末尾的点
    let verdict = engine.evaluate(&build_query("ONE.Example.COM.", true), Frontend::Udp);
    assert_matches!(verdict, Verdict::Synthesized(_, name) if name == "exact");

    // 通配符匹配子域名
    let verdict = engine.evaluate(&build_query("deep.a.sub.example.com.", true), Frontend::Udp);
    assert_matches!(verdict, Verdict::Synthesized(_, name) if name == "suffix");

    // 通配符同时覆盖后缀本身
    let verdict = engine.evaluate(&build_query("sub.example.com.", true), Frontend::Udp);
    assert_matches!(verdict, Verdict::Synthesized(_, name) if name == "suffix");

    // 通配符不匹配只共享字符串后缀而非标签边界的名称
    let verdict = engine.evaluate(&build_query("badsub.example.com.", true), Frontend::Udp);
    assert_matches!(verdict, Verdict::Routed(_));

    // 正则匹配
    let verdict = engine.evaluate(&build_query("api.backend.net.", true), Frontend::Udp);
    assert_matches!(verdict, Verdict::Synthesized(_, name) if name == "regex");
}

#[test]
fn test_global_wildcard_matches_everything() {
    let (engine, _registry) = build_engine(vec![rule(
        "catchall",
        MatchType::Wildcard,
        "*",
        RuleActionConfig::Refused,
    )]);

    let verdict = engine.evaluate(&build_query("anything.at.all.example.", true), Frontend::Https);
    assert_matches!(verdict, Verdict::Synthesized(_, name) if name == "catchall");
}

#[test]
fn test_invalid_wildcard_pattern_is_rejected() {
    let registry = Arc::new(CounterRegistry::new());
    let result = RuleEngine::new(
        vec![rule(
            "bad",
            MatchType::Wildcard,
            "no-leading-star.example.com",
            RuleActionConfig::Nxdomain,
        )],
        "default".to_string(),
        registry,
    );

    assert!(result.is_err());
}

#[test]
fn test_rule_counters_declared_before_traffic() {
    let (_engine, registry) = build_engine(vec![
        rule(
            "nxdomain",
            MatchType::Exact,
            "a.example.com",
            RuleActionConfig::Nxdomain,
        ),
        pool_rule("cache", MatchType::Exact, "b.example.com", "cache"),
    ]);

    // 规则计数器在引擎构建时即出现在快照中，初值为0
    let snapshot = registry.snapshot();
    assert_eq!(snapshot.get("rule-nxdomain"), Some(&0));
    assert_eq!(snapshot.get("rule-cache"), Some(&0));
}
