use std::env;
use std::path::PathBuf;

use glam::{DVec2, DVec3};
use skdep_config::AppConfig;
use skdep_core::model::EntityId;
use skdep_engine::command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
use skdep_engine::index::EntitySet;
use skdep_engine::picking::{Camera, PointerButton};
use skdep_engine::primitive::RenderGroup;
use skdep_engine::session::{SessionObserver, SessionSlot, SketchSession};
use tracing::{info, warn};

use crate::data_locator::DataLocator;
use crate::errors::FrontendError;
use crate::loader::{DataOrigin, LoadRequest, load_data};
use crate::options::session_options;

/// 未指定 `--exec` 时执行的命令。
pub const DEFAULT_SCRIPT: &[&str] = &["summary", "list_all", "reset_range"];

/// 命令行参数对配置的覆盖。
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub data: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub commands: Vec<String>,
    pub no_demo: bool,
}

/// 把核心回调打印到标准输出。
#[derive(Debug, Default)]
pub struct PrintingObserver;

impl SessionObserver for PrintingObserver {
    fn on_highlight_entities(&mut self, set: Option<&EntitySet>) {
        match set {
            Some(set) if !set.is_empty() => {
                let mut ids: Vec<&str> = set.iter().map(EntityId::as_str).collect();
                ids.sort_unstable();
                println!("[高亮] {}", ids.join(", "));
            }
            _ => println!("[高亮] 已清除"),
        }
    }

    fn on_select(&mut self, entity: Option<&EntityId>, screen: DVec2) {
        match entity {
            Some(id) => println!("[选中] {id} @ ({:.0}, {:.0})", screen.x, screen.y),
            None => println!("[选中] 空白区域 @ ({:.0}, {:.0})", screen.x, screen.y),
        }
    }

    fn on_range_change(&mut self, lo: u32, hi: u32) {
        println!("[范围] [{lo}, {hi}]");
    }

    fn flash_not_found(&mut self) {
        println!("[搜索] 未找到匹配项");
    }
}

/// 加载数据、打印概览、执行命令并演示拾取。
pub fn run(config: &AppConfig, args: CliArgs) -> Result<(), FrontendError> {
    let mut request = LoadRequest::from_config(config);
    if let Some(path) = args.data {
        request.local_path = Some(path);
    }
    if let Some(url) = args.endpoint {
        // 显式给出的端点总是优先尝试
        request.endpoint = Some(url);
        request.prefer_local = false;
    }
    request.allow_demo = !args.no_demo;

    let base_dir = env::current_dir().ok();
    let locator = DataLocator::from_config(base_dir.as_deref(), config);

    let mut slot = SessionSlot::new();
    let ticket = slot.begin_reload();
    let loaded = load_data(&request, &locator)?;
    let session = SketchSession::new(
        loaded.data,
        session_options(config),
        Box::new(PrintingObserver),
    );
    slot.complete_reload(ticket, session);

    if let Some(session) = slot.current_mut() {
        print_overview(session, &loaded.origin);

        let bus = CommandBus::new();
        let mut commands: Vec<&str> = bus.available_commands().copied().collect();
        commands.sort_unstable();
        println!("支持的命令: {}", commands.join(", "));

        let script: Vec<String> = if args.commands.is_empty() {
            DEFAULT_SCRIPT.iter().map(|line| line.to_string()).collect()
        } else {
            args.commands
        };
        let mut context = CommandContext { session };
        for line in &script {
            execute_line(&bus, line, &mut context);
        }
        print_script_state(context.session);

        demonstrate_picking(context.session);
    }

    slot.teardown();
    Ok(())
}

fn print_overview(session: &SketchSession, origin: &DataOrigin) {
    let data = session.data();
    let range = session.range();
    info!(
        origin = %origin,
        entities = data.entities.len(),
        features = session.feature_summary().len(),
        "CLI 数据统计"
    );

    println!("草图依赖检查器 CLI");
    println!("数据来源：{origin}");
    println!(
        "实体 {} 个，图元 {} 个，依赖计数范围 [{}, {}]",
        data.entities.len(),
        session.group().len(),
        range.global_min(),
        range.global_max()
    );
    println!(
        "元素索引 {} 项，特征索引 {} 项",
        session.index().element_count(),
        session.index().feature_count()
    );

    println!("图例：");
    for step in 0..=4 {
        let fraction = f64::from(step) / 4.0;
        let value = range.fraction_to_value(fraction);
        let color = skdep_core::color::color_for_dependencies(
            f64::from(value),
            f64::from(range.global_min()),
            f64::from(range.global_max()),
        );
        println!("  {:>4.0}% → {value} 个依赖 {}", fraction * 100.0, color.css());
    }

    println!("特征概览：");
    for (id, feature) in session.feature_summary() {
        println!(
            "  - {} ({}) [{}]: {} 个实体",
            feature.name,
            feature.feature_type,
            id,
            feature.entities.len()
        );
    }
}

fn print_script_state(session: &SketchSession) {
    println!("{}", range_marker(session));
    let last = session.search_index().last_results();
    if !last.is_empty() {
        println!(
            "最近一次查询：{} 个文档，{} 个元素，{} 个特征",
            last.documents.len(),
            last.element_count(),
            last.feature_count()
        );
    }
}

/// 当前范围在图例滑块上的位置。
fn range_marker(session: &SketchSession) -> String {
    let range = session.range();
    let (lo, hi) = range.effective();
    let start = range.value_to_fraction(f64::from(lo)) * 100.0;
    let end = range.value_to_fraction(f64::from(hi)) * 100.0;
    format!("当前范围 [{lo}, {hi}]，图例位置 {start:.0}% ~ {end:.0}%")
}

fn execute_line(bus: &CommandBus, line: &str, context: &mut CommandContext<'_>) {
    let Some(request) = CommandRequest::parse(line) else {
        return;
    };
    println!("> {line}");
    let CommandResponse { success, message } = bus.dispatch(&request, context);
    if success {
        if let Some(message) = message {
            println!("{message}");
        }
    } else {
        warn!("CLI 命令执行失败: {}", message.unwrap_or_default());
    }
}

/// 俯视相机，使整个图元组落在视野内。
pub fn fit_camera(group: &RenderGroup) -> Camera {
    let bounds = group.bounds();
    let (center, extent) = if bounds.is_empty() {
        (DVec3::ZERO, 1000.0)
    } else {
        (bounds.center(), bounds.diagonal().max(1.0))
    };
    Camera::looking_at(center + DVec3::Z * extent * 1.5, center).with_up(DVec3::Y)
}

/// 把第一条折线的首段中点投影到屏幕并点击，随后点击空白处。返回被选中的实体。
pub fn demonstrate_picking(session: &mut SketchSession) -> Option<EntityId> {
    let camera = fit_camera(session.group());
    session.attach_camera(&camera);

    let target = session.group().iter().find_map(|(_, primitive)| {
        if !primitive.kind().is_polyline() {
            return None;
        }
        let (a, b) = primitive.world_segments().into_iter().next()?;
        Some((primitive.entity().clone(), (a + b) * 0.5))
    });
    let Some((expected, midpoint)) = target else {
        println!("没有可拾取的折线图元");
        return None;
    };
    let Some(screen) = camera.project(midpoint) else {
        warn!(entity = %expected, "图元不在视野内");
        return None;
    };

    println!("拾取演示：点击 {expected} 的投影位置 ({:.0}, {:.0})", screen.x, screen.y);
    session.pointer_move(&camera, screen);
    let selected = session.pointer_down(&camera, screen, PointerButton::Primary);
    if let Some(id) = &selected {
        let breakdown = session.dependencies_of(id.as_str());
        println!(
            "选中 {id}：{} 个依赖特征，涉及 {} 个文档",
            breakdown.feature_count(),
            breakdown.documents.len()
        );
    }

    session.pointer_down(&camera, DVec2::new(2.0, 2.0), PointerButton::Primary);
    session.pointer_leave();
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use skdep_engine::demo::demo_data;
    use skdep_engine::session::{NullObserver, SessionOptions};

    #[test]
    fn fitted_camera_sees_the_whole_group() {
        let session = SketchSession::new(demo_data(), SessionOptions::default(), Box::new(NullObserver));
        let camera = fit_camera(session.group());
        let bounds = session.group().bounds();
        for corner in [bounds.min(), bounds.max()] {
            let screen = camera.project(corner).expect("角点应在相机前方");
            assert!(screen.x >= 0.0 && screen.x <= 1280.0);
            assert!(screen.y >= 0.0 && screen.y <= 720.0);
        }
    }

    #[test]
    fn picking_demo_selects_then_clears() {
        let mut session =
            SketchSession::new(demo_data(), SessionOptions::default(), Box::new(NullObserver));
        let selected = demonstrate_picking(&mut session).expect("演示应选中一个实体");
        assert!(session.data().entity(selected.as_str()).is_some());
        // 最后一次点击落在空白处，选中被清除、焦点恢复为范围结果
        assert!(session.picking_state().selected.is_none());
        assert_eq!(session.overlays().live_count(), 0);
        assert_eq!(
            session.highlight().active_set().map(|set| set.len()),
            Some(session.data().entities.len())
        );
    }

    #[test]
    fn range_marker_follows_the_legend() {
        let mut session =
            SketchSession::new(demo_data(), SessionOptions::default(), Box::new(NullObserver));
        let (min, max) = (session.range().global_min(), session.range().global_max());
        assert!(min < max);
        assert_eq!(
            range_marker(&session),
            format!("当前范围 [{min}, {max}]，图例位置 0% ~ 100%")
        );

        session.set_range(i64::from(max), i64::from(max));
        assert!(range_marker(&session).ends_with("100% ~ 100%"));
    }

    #[test]
    fn run_with_demo_data_and_custom_script() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let mut config = AppConfig::default();
        config.data.local_path = Some(dir.path().join("absent.json"));
        let args = CliArgs {
            commands: vec![
                "set_range 4 9".to_string(),
                "focus JHC".to_string(),
                "dependencies JHC".to_string(),
                "explode".to_string(),
            ],
            ..CliArgs::default()
        };
        run(&config, args).expect("回退到示例数据时不应失败");
    }

    #[test]
    fn run_without_demo_reports_missing_data() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let mut config = AppConfig::default();
        config.data.local_path = Some(dir.path().join("absent.json"));
        let args = CliArgs {
            no_demo: true,
            ..CliArgs::default()
        };
        assert!(matches!(
            run(&config, args),
            Err(FrontendError::NoDataSource { .. })
        ));
    }
}
