//! 컨테이너 이름 필터
//!
//! include 목록이 비어 있지 않으면 include 목록만 통과시키고,
//! 그렇지 않으면 exclude 목록에 없는 이름을 통과시킵니다 (include 우선).
//! 비교는 대소문자를 구분하는 정확한 문자열 일치입니다.

use docklog_core::config::FilterConfig;

/// include/exclude 이름 필터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl NameFilter {
    /// 새 필터를 생성합니다.
    pub fn new(includes: Vec<String>, excludes: Vec<String>) -> Self {
        Self { includes, excludes }
    }

    /// 코어 설정에서 필터를 생성합니다.
    pub fn from_core(core: &FilterConfig) -> Self {
        Self::new(core.includes.clone(), core.excludes.clone())
    }

    /// 이름이 수집 대상인지 판단합니다.
    pub fn allows(&self, name: &str) -> bool {
        if !self.includes.is_empty() {
            return self.includes.iter().any(|n| n == name);
        }
        !self.excludes.iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn empty_filter_allows_everything() {
        let filter = NameFilter::default();
        assert!(filter.allows("web"));
        assert!(filter.allows(""));
    }

    #[test]
    fn excludes_block_exact_names() {
        let filter = NameFilter::new(vec![], names(&["db", "cache"]));
        assert!(!filter.allows("db"));
        assert!(!filter.allows("cache"));
        assert!(filter.allows("web"));
        assert!(filter.allows("db2"), "prefix match must not exclude");
    }

    #[test]
    fn includes_allow_only_listed_names() {
        let filter = NameFilter::new(names(&["web"]), vec![]);
        assert!(filter.allows("web"));
        assert!(!filter.allows("db"));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let filter = NameFilter::new(names(&["Web"]), vec![]);
        assert!(!filter.allows("web"));
    }

    #[test]
    fn includes_win_when_both_are_set() {
        let filter = NameFilter::new(names(&["web"]), names(&["web", "db"]));
        assert!(filter.allows("web"));
        assert!(!filter.allows("db"));
        assert!(!filter.allows("cache"));
    }

    #[test]
    fn from_core_copies_lists() {
        let core = FilterConfig {
            includes: vec![],
            excludes: names(&["db"]),
        };
        assert!(!NameFilter::from_core(&core).allows("db"));
    }

    proptest! {
        #[test]
        fn non_empty_includes_ignore_excludes(
            includes in proptest::collection::vec("[a-z]{1,6}", 1..5),
            excludes in proptest::collection::vec("[a-z]{1,6}", 0..5),
            name in "[a-z]{1,6}",
        ) {
            let filter = NameFilter::new(includes.clone(), excludes);
            prop_assert_eq!(filter.allows(&name), includes.contains(&name));
        }

        #[test]
        fn excludes_only_reject_listed(
            excludes in proptest::collection::vec("[a-z]{1,6}", 0..5),
            name in "[a-z]{1,6}",
        ) {
            let filter = NameFilter::new(vec![], excludes.clone());
            prop_assert_eq!(filter.allows(&name), !excludes.contains(&name));
        }
    }
}
