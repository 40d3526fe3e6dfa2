use std::collections::HashMap;
use std::fmt::Write as _;

use skdep_core::model::FeatureKey;

use crate::errors::EngineError;
use crate::inspect::PinnedFeature;
use crate::search::{SearchOutcome, SearchResults};
use crate::session::SketchSession;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    /// 按空白切分一行命令文本，首个词为命令名。
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let name = parts.next()?;
        Some(Self {
            name,
            args: parts.collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl From<EngineError> for CommandResponse {
    fn from(error: EngineError) -> Self {
        CommandResponse::err(error.to_string())
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut SketchSession,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(SetRangeCommand);
        bus.register(ResetRangeCommand);
        bus.register(SearchCommand);
        bus.register(ListAllCommand);
        bus.register(PinFeatureCommand);
        bus.register(FocusEntityCommand);
        bus.register(ClearFocusCommand);
        bus.register(DependenciesCommand);
        bus.register(SummaryCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

fn parse_bound(command: &'static str, raw: Option<&String>) -> Result<i64, EngineError> {
    let raw = raw.ok_or_else(|| EngineError::InvalidArgument {
        command,
        reason: "需要两个整数参数 <lo> <hi>".to_string(),
    })?;
    raw.parse::<i64>().map_err(|_| EngineError::InvalidArgument {
        command,
        reason: format!("无法解析整数: {raw}"),
    })
}

fn describe_results(results: &SearchResults) -> String {
    let mut out = String::new();
    for document in &results.documents {
        let _ = writeln!(out, "{} [{}]", document.name, document.id);
        for element in &document.elements {
            let _ = writeln!(out, "  {} [{}]", element.name, element.id);
            for feature in &element.features {
                let _ = writeln!(
                    out,
                    "    {} ({}) [{}]",
                    feature.name, feature.feature_type, feature.id
                );
            }
        }
    }
    out.trim_end().to_string()
}

fn describe_outcome(outcome: &SearchOutcome) -> CommandResponse {
    match outcome {
        SearchOutcome::Hidden => CommandResponse::ok("查询为空"),
        SearchOutcome::NoMatches => CommandResponse::err("没有匹配项"),
        SearchOutcome::Results(results) => CommandResponse::ok(describe_results(results)),
        SearchOutcome::Pinned { results, entities } => {
            let mut ids: Vec<&str> = entities.iter().map(|id| id.as_str()).collect();
            ids.sort_unstable();
            CommandResponse::ok(format!(
                "{}\n锁定特征实体: {}",
                describe_results(results),
                ids.join(", ")
            ))
        }
    }
}

struct SetRangeCommand;

impl CommandHandler for SetRangeCommand {
    fn name(&self) -> &'static str {
        "set_range"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let bounds = parse_bound(self.name(), request.args.first())
            .and_then(|lo| Ok((lo, parse_bound(self.name(), request.args.get(1))?)));
        match bounds {
            Ok((lo, hi)) => {
                let (lo, hi) = context.session.set_range(lo, hi);
                let active = context.session.highlight().active_set().map_or(0, |set| set.len());
                CommandResponse::ok(format!("依赖范围 [{lo}, {hi}]，激活实体 {active} 个"))
            }
            Err(error) => error.into(),
        }
    }
}

struct ResetRangeCommand;

impl CommandHandler for ResetRangeCommand {
    fn name(&self) -> &'static str {
        "reset_range"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let (lo, hi) = context.session.reset_range();
        CommandResponse::ok(format!("依赖范围已重置为 [{lo}, {hi}]"))
    }
}

struct SearchCommand;

impl CommandHandler for SearchCommand {
    fn name(&self) -> &'static str {
        "search"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let query = request.args.join(" ");
        describe_outcome(&context.session.search(&query, false))
    }
}

struct ListAllCommand;

impl CommandHandler for ListAllCommand {
    fn name(&self) -> &'static str {
        "list_all"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        // 列出全部即放弃锁定
        context.session.clear_pin();
        describe_outcome(&context.session.search("", true))
    }
}

struct PinFeatureCommand;

impl CommandHandler for PinFeatureCommand {
    fn name(&self) -> &'static str {
        "pin"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let [document, element, feature, name @ ..] = request.args.as_slice() else {
            return EngineError::InvalidArgument {
                command: self.name(),
                reason: "用法: pin <did> <eid> <fid> [name…]".to_string(),
            }
            .into();
        };
        let pinned = PinnedFeature::new(
            FeatureKey::new(document.as_str(), element.as_str(), feature.as_str()),
            name.join(" "),
        );
        describe_outcome(&context.session.set_pinned_feature_and_search(pinned))
    }
}

struct FocusEntityCommand;

impl CommandHandler for FocusEntityCommand {
    fn name(&self) -> &'static str {
        "focus"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(entity) = request.args.first() else {
            return EngineError::InvalidArgument {
                command: self.name(),
                reason: "需要实体 ID".to_string(),
            }
            .into();
        };
        match context.session.focus_entity(entity) {
            Ok(()) => CommandResponse::ok(format!("已聚焦实体 {entity}")),
            Err(error) => error.into(),
        }
    }
}

struct ClearFocusCommand;

impl CommandHandler for ClearFocusCommand {
    fn name(&self) -> &'static str {
        "clear_focus"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        context.session.clear_focus();
        CommandResponse::ok("焦点覆盖已清除")
    }
}

struct DependenciesCommand;

impl CommandHandler for DependenciesCommand {
    fn name(&self) -> &'static str {
        "dependencies"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(entity) = request.args.first() else {
            return EngineError::InvalidArgument {
                command: self.name(),
                reason: "需要实体 ID".to_string(),
            }
            .into();
        };
        let breakdown = context.session.dependencies_of(entity);
        if breakdown.is_empty() {
            return CommandResponse::ok(format!("实体 {entity} 没有依赖特征"));
        }

        let link_base = context.session.options().link_base.as_str();
        let mut out = format!("实体 {entity} 的依赖:");
        for document in &breakdown.documents {
            let _ = write!(out, "\n{} [{}]", document.name, document.id);
            for element in &document.elements {
                let _ = write!(out, "\n  {} [{}]", element.name, element.id);
                if let Some(link) = document.element_link(element, link_base) {
                    let _ = write!(out, " {link}");
                }
                for feature in &element.features {
                    let _ = write!(out, "\n    {} ({})", feature.name, feature.feature_type);
                }
            }
        }
        CommandResponse::ok(out)
    }
}

struct SummaryCommand;

impl CommandHandler for SummaryCommand {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let session = &*context.session;
        let range = session.range();
        let (lo, hi) = range.effective();
        let mut out = format!(
            "实体 {} 个，图元 {} 个，依赖范围 [{}, {}]，当前过滤 [{lo}, {hi}]",
            session.data().entities.len(),
            session.group().len(),
            range.global_min(),
            range.global_max(),
        );
        for (id, feature) in session.feature_summary() {
            let _ = write!(
                out,
                "\n  {} ({}) [{}]: {} 个实体",
                feature.name,
                feature.feature_type,
                id,
                feature.entities.len()
            );
        }
        CommandResponse::ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::demo_data;
    use crate::session::{NullObserver, SessionOptions};

    fn run(bus: &CommandBus, session: &mut SketchSession, line: &str) -> CommandResponse {
        let request = CommandRequest::parse(line).expect("命令行不应为空");
        let mut context = CommandContext { session };
        bus.dispatch(&request, &mut context)
    }

    #[test]
    fn range_and_focus_commands_work() {
        let mut session =
            SketchSession::new(demo_data(), SessionOptions::default(), Box::new(NullObserver));
        let bus = CommandBus::new();

        let response = run(&bus, &mut session, "set_range 4 9");
        assert!(response.success);
        assert_eq!(session.range().effective(), (4, 9));

        assert!(run(&bus, &mut session, "focus JHB").success);
        assert_eq!(session.overlays().live_count(), 1);
        assert!(run(&bus, &mut session, "clear_focus").success);
        assert_eq!(session.overlays().live_count(), 0);
        assert_eq!(session.highlight().active_set().map(|set| set.len()), Some(2));

        assert!(!run(&bus, &mut session, "focus nothing").success);
        assert!(!run(&bus, &mut session, "set_range four 9").success);
        assert!(!run(&bus, &mut session, "explode").success);
    }

    #[test]
    fn search_and_dependency_commands_report() {
        let mut session =
            SketchSession::new(demo_data(), SessionOptions::default(), Box::new(NullObserver));
        let bus = CommandBus::new();

        let found = run(&bus, &mut session, "search arm");
        assert!(found.success);
        assert!(found.message.as_deref().is_some_and(|m| m.contains("Intake Arm")));

        assert!(!run(&bus, &mut session, "search zzz-nothing").success);

        let pinned = run(&bus, &mut session, "pin dDrive eLayout FLayout Master Sketch");
        assert!(pinned.success);
        assert!(pinned.message.as_deref().is_some_and(|m| m.contains("JHJ")));

        assert!(run(&bus, &mut session, "list_all").success);
        assert!(session.search_index().pinned().is_none());

        let deps = run(&bus, &mut session, "dependencies JHC");
        assert!(deps.message.as_deref().is_some_and(|m| {
            m.contains("https://cad.onshape.com/documents/dArm/w/wArm/e/eArm")
        }));
        let none = run(&bus, &mut session, "dependencies JHI");
        assert!(none.success);

        assert!(run(&bus, &mut session, "summary").success);
        assert!(!run(&bus, &mut session, "pin only-two args").success);
    }
}
