//! 이미지 참조에서 그룹 추출
//!
//! 그룹은 호스트 부분 뒤 첫 두 `/` 사이의 경로 세그먼트입니다.
//! `registry:5000/team/app:1.0` → `team`, `registry/app:1.0` → `""`

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

static GROUP_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"/(.*?)/"));

/// 이미지 참조에서 그룹을 추출합니다. 매칭되지 않으면 빈 문자열을 반환합니다.
pub fn extract_group(image: &str) -> String {
    let re = match GROUP_RE.as_ref() {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "group pattern failed to compile");
            return String::new();
        }
    };
    match re.captures(image).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_owned(),
        None => {
            debug!(image, "no group for image");
            String::new()
        }
    }
}
