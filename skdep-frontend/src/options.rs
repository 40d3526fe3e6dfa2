use skdep_config::AppConfig;
use skdep_core::color::{NEUTRAL_GRAY, Rgb};
use skdep_engine::highlight::HighlightStyle;
use skdep_engine::picking::{FeedbackFactors, ToleranceModel};
use skdep_engine::search::ExclusionRule;
use skdep_engine::session::SessionOptions;
use tracing::warn;

/// 把配置各节映射为引擎选项，引擎本身不依赖配置 crate。
pub fn session_options(config: &AppConfig) -> SessionOptions {
    let picking = &config.picking;
    let highlight = &config.highlight;

    let tolerance = ToleranceModel {
        hover_pixels: picking.hover_pixels,
        click_pixels: picking.click_pixels,
        point_pixels: picking.point_pixels,
        min_line_tolerance: picking.min_line_tolerance,
        min_point_tolerance: picking.min_point_tolerance,
        ..ToleranceModel::default()
    };
    let feedback = FeedbackFactors {
        hover_line: picking.hover_line_factor,
        hover_point: picking.hover_point_factor,
        selected_line: picking.selected_line_factor,
        selected_point: picking.selected_point_factor,
    };
    let dimmed_color = parse_color(&highlight.dimmed_color).unwrap_or_else(|| {
        warn!(value = %highlight.dimmed_color, "无法解析置灰颜色，使用默认灰色");
        NEUTRAL_GRAY
    });
    SessionOptions {
        tolerance,
        feedback,
        highlight: HighlightStyle {
            dimmed_color,
            range_dim_opacity: highlight.range_dim_opacity.clamp(0.0, 1.0),
            focus_dim_opacity: highlight.focus_dim_opacity.clamp(0.0, 1.0),
        },
        // 空标签即不排除任何条目
        exclusion: ExclusionRule::new(&config.search.excluded_label),
        selection_overlay_width: highlight.selection_overlay_width,
        search_overlay_width: highlight.search_overlay_width,
        link_base: config.search.link_base.trim_end_matches('/').to_string(),
        ..SessionOptions::default()
    }
}

/// 解析 `#RRGGBB` 或 `RRGGBB`。
fn parse_color(raw: &str) -> Option<Rgb> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().map(Rgb::from_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_to_engine_defaults() {
        let options = session_options(&AppConfig::default());
        assert_eq!(options, SessionOptions::default());
    }

    #[test]
    fn config_overrides_reach_the_engine() {
        let mut config = AppConfig::default();
        config.picking.hover_pixels = 12.0;
        config.picking.selected_line_factor = 4.0;
        config.highlight.dimmed_color = "#808080".to_string();
        config.search.excluded_label = "  ".to_string();
        config.search.link_base = "https://cad.example.com/".to_string();

        let options = session_options(&config);
        assert_eq!(options.tolerance.hover_pixels, 12.0);
        assert_eq!(options.feedback.selected_line, 4.0);
        assert_eq!(options.highlight.dimmed_color, Rgb::from_hex(0x808080));
        assert!(!options.exclusion.excludes("Master Sketch"));
        assert_eq!(options.link_base, "https://cad.example.com");
    }

    #[test]
    fn bad_colors_fall_back_to_gray() {
        let mut config = AppConfig::default();
        config.highlight.dimmed_color = "grey".to_string();
        assert_eq!(session_options(&config).highlight.dimmed_color, NEUTRAL_GRAY);
        assert_eq!(parse_color("C0C0C0"), Some(NEUTRAL_GRAY));
    }
}
