//! Engine configuration.
//!
//! The ancestor fetch cap is the only built-in bound against unbounded
//! work during graph traversal; everything else runs to completion within
//! the triggering request.

/// Configuration for the traversal and scoring engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of incoming links examined per trunk while walking
    /// up the ancestor graph (default: 1000)
    pub ancestor_fetch_limit: usize,
    /// Maximum number of in-progress courses reported on the dashboard
    /// (default: 5)
    pub recent_courses_limit: usize,
    /// Score at which a course counts as completed (default: 100)
    pub score_ceiling: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ancestor_fetch_limit: 1000,
            recent_courses_limit: 5,
            score_ceiling: 100,
        }
    }
}

impl Config {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LANTERN_ANCESTOR_FETCH_LIMIT") {
            if let Ok(limit) = val.parse::<usize>() {
                config.ancestor_fetch_limit = limit;
            }
        }

        if let Ok(val) = std::env::var("LANTERN_RECENT_COURSES_LIMIT") {
            if let Ok(limit) = val.parse::<usize>() {
                config.recent_courses_limit = limit;
            }
        }

        if let Ok(val) = std::env::var("LANTERN_SCORE_CEILING") {
            if let Ok(ceiling) = val.parse::<u32>() {
                config.score_ceiling = ceiling;
            }
        }

        config
    }
}
