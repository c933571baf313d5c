//! Embedded image assets, served as data URIs so no files ship alongside the binary.

use base64::Engine;

const INTRO_BANNER_SVG: &str = r##"<svg width="600" height="320" viewBox="0 0 600 320" fill="none" xmlns="http://www.w3.org/2000/svg">
  <rect width="600" height="320" rx="24" fill="#2563EB"/>
  <rect x="24" y="24" width="552" height="272" rx="18" fill="#ffffff" fill-opacity="0.08"/>
  <text x="300" y="150" text-anchor="middle" font-family="sans-serif" font-size="44" font-weight="800" fill="#ffffff">예방접종 오피셜 봇</text>
  <text x="300" y="205" text-anchor="middle" font-family="sans-serif" font-size="20" fill="#DBEAFE">질병관리청 공식 데이터로 답변합니다</text>
</svg>"##;

/// Alt text for the intro banner.
pub const INTRO_BANNER_ALT: &str = "안내 배너";

/// Returns `data:image/svg+xml;base64,...` for an SVG document.
pub fn svg_data_uri(svg: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(svg.trim().as_bytes());
    format!("data:image/svg+xml;base64,{encoded}")
}

/// Data URI of the banner shown as the first transcript entry.
pub fn intro_banner_uri() -> String {
    svg_data_uri(INTRO_BANNER_SVG)
}
