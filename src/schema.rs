/// Column-name constants for the speed-dating tables.
/// Single source of truth - exported to Python via PyO3.

// ── Respondent columns ──────────────────────────────────────────────────────
pub mod respondent {
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const FIELD_OF_STUDY: &str = "field_of_study";
    pub const ETHNIC_GROUP: &str = "ethnic_group";
    pub const SATISFACTION: &str = "satis_2";
    pub const DATE_DURATION: &str = "length";
    pub const DATE_COUNT: &str = "speed_date_nb";

    pub const ALL: [&str; 7] = [
        AGE,
        GENDER,
        FIELD_OF_STUDY,
        ETHNIC_GROUP,
        SATISFACTION,
        DATE_DURATION,
        DATE_COUNT,
    ];
}

// ── Aggregate columns ───────────────────────────────────────────────────────
pub mod aggregate {
    pub const COUNT: &str = "count";
    pub const PERCENTAGE: &str = "percentage";
    pub const RANK: &str = "rank";
}

// ── Filter values ───────────────────────────────────────────────────────────
pub mod filter {
    /// Dropdown value meaning "do not filter on this column".
    pub const ALL: &str = "All";
}

// ── Input files ─────────────────────────────────────────────────────────────
pub mod files {
    pub const SURVEY: &str = "data_speed_dating.csv";
    pub const RESPONDENTS: &str = "subdata_speed_dating.csv";
}
