use serde::{Deserialize, Serialize};

/// Number of sessions tracked per student in one period.
pub const SESSION_COUNT: usize = 6;

/// Participation count at which a student is considered to participate enough.
const PARTICIPATION_TARGET: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMark {
    #[serde(default)]
    pub present: bool,
    #[serde(default)]
    pub participated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub sessions: Vec<SessionMark>,
}

impl AttendanceRecord {
    /// A fresh record with every mark unset.
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            sessions: vec![SessionMark::default(); SESSION_COUNT],
        }
    }

    pub fn absences(&self) -> usize {
        count_absences(&self.sessions)
    }

    pub fn participations(&self) -> usize {
        count_participations(&self.sessions)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Good,
    Warning,
    Excluded,
}

impl Tier {
    pub fn from_absences(absences: usize) -> Self {
        match absences {
            0..=2 => Tier::Good,
            3..=4 => Tier::Warning,
            _ => Tier::Excluded,
        }
    }

    /// Row color the UI paints for this tier.
    pub fn band(self) -> &'static str {
        match self {
            Tier::Good => "green",
            Tier::Warning => "yellow",
            Tier::Excluded => "red",
        }
    }

    fn headline(self, participates_enough: bool) -> &'static str {
        match (self, participates_enough) {
            (Tier::Good, true) => "Good attendance – Excellent participation",
            (Tier::Good, false) => "Good attendance – You need to participate more",
            (Tier::Warning, true) => "Warning – attendance low – Good participation",
            (Tier::Warning, false) => "Warning – attendance low – You need to participate more",
            (Tier::Excluded, true) => "Excluded – too many absences – Good participation",
            (Tier::Excluded, false) => {
                "Excluded – too many absences – You need to participate more"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub absences: usize,
    pub participations: usize,
    pub tier: Tier,
    pub band: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("expected {expected} sessions, got {actual}")]
    InvalidInput { expected: usize, actual: usize },
}

fn count_absences(sessions: &[SessionMark]) -> usize {
    sessions.iter().filter(|s| !s.present).count()
}

fn count_participations(sessions: &[SessionMark]) -> usize {
    sessions.iter().filter(|s| s.participated).count()
}

/// Scores one student's sessions.
///
/// Tier comes from the absence count alone; the participation count only
/// selects the second half of the message. A participated mark on an absent
/// session still counts.
pub fn classify(sessions: &[SessionMark]) -> Result<Classification, ClassifyError> {
    if sessions.len() != SESSION_COUNT {
        return Err(ClassifyError::InvalidInput {
            expected: SESSION_COUNT,
            actual: sessions.len(),
        });
    }

    let absences = count_absences(sessions);
    let participations = count_participations(sessions);
    let tier = Tier::from_absences(absences);
    let headline = tier.headline(participations >= PARTICIPATION_TARGET);

    Ok(Classification {
        absences,
        participations,
        tier,
        band: tier.band(),
        message: format!(
            "{} (Absences: {}, Participations: {})",
            headline, absences, participations
        ),
    })
}

/// Highlight predicate. Stricter than `Tier::Good` on absences and kept
/// separate from it.
pub fn is_excellent(record: &AttendanceRecord) -> bool {
    record.participations() >= PARTICIPATION_TARGET && record.absences() <= 1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub total: usize,
    pub present_at_least_once: usize,
    pub participated_at_least_once: usize,
}

pub fn aggregate<'a, I>(records: I) -> AggregateReport
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    records
        .into_iter()
        .fold(AggregateReport::default(), |mut acc, r| {
            acc.total += 1;
            if r.sessions.iter().any(|s| s.present) {
                acc.present_at_least_once += 1;
            }
            if r.sessions.iter().any(|s| s.participated) {
                acc.participated_at_least_once += 1;
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn marks(present: [bool; 6], participated: [bool; 6]) -> Vec<SessionMark> {
        present
            .iter()
            .zip(participated.iter())
            .map(|(&p, &q)| SessionMark {
                present: p,
                participated: q,
            })
            .collect()
    }

    /// Sessions with exactly `absences` absent marks and `participations`
    /// participated marks, laid out from the front.
    fn shaped(absences: usize, participations: usize) -> Vec<SessionMark> {
        (0..SESSION_COUNT)
            .map(|i| SessionMark {
                present: i >= absences,
                participated: i < participations,
            })
            .collect()
    }

    fn record(id: &str, sessions: Vec<SessionMark>) -> AttendanceRecord {
        AttendanceRecord {
            student_id: id.to_string(),
            sessions,
        }
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(Tier::from_absences(0), Tier::Good);
        assert_eq!(Tier::from_absences(2), Tier::Good);
        assert_eq!(Tier::from_absences(3), Tier::Warning);
        assert_eq!(Tier::from_absences(4), Tier::Warning);
        assert_eq!(Tier::from_absences(5), Tier::Excluded);
        assert_eq!(Tier::from_absences(6), Tier::Excluded);
    }

    #[test]
    fn message_table_is_exhaustive() {
        let cases = [
            (0, 4, "Good attendance – Excellent participation"),
            (2, 3, "Good attendance – You need to participate more"),
            (3, 6, "Warning – attendance low – Good participation"),
            (4, 0, "Warning – attendance low – You need to participate more"),
            (5, 4, "Excluded – too many absences – Good participation"),
            (6, 1, "Excluded – too many absences – You need to participate more"),
        ];
        for (abs, par, headline) in cases {
            let c = classify(&shaped(abs, par)).expect("classify");
            assert_eq!(
                c.message,
                format!("{} (Absences: {}, Participations: {})", headline, abs, par)
            );
        }
    }

    #[test]
    fn mixed_marks_example() {
        let sessions = marks(
            [true, false, true, true, false, true],
            [true, false, true, false, false, true],
        );
        let c = classify(&sessions).expect("classify");
        assert_eq!(c.absences, 2);
        assert_eq!(c.participations, 3);
        assert_eq!(c.tier, Tier::Good);
        assert_eq!(c.band, "green");
        assert!(c
            .message
            .starts_with("Good attendance – You need to participate more"));
    }

    #[test]
    fn perfect_record() {
        let c = classify(&marks([true; 6], [true; 6])).expect("classify");
        assert_eq!(c.absences, 0);
        assert_eq!(c.participations, 6);
        assert_eq!(
            c.message,
            "Good attendance – Excellent participation (Absences: 0, Participations: 6)"
        );
    }

    #[test]
    fn excluded_but_participating() {
        let c = classify(&shaped(5, 4)).expect("classify");
        assert_eq!(c.tier, Tier::Excluded);
        assert_eq!(c.band, "red");
        assert!(c
            .message
            .starts_with("Excluded – too many absences – Good participation"));
    }

    #[test]
    fn participation_while_absent_still_counts() {
        let c = classify(&marks([false; 6], [true; 6])).expect("classify");
        assert_eq!(c.absences, 6);
        assert_eq!(c.participations, 6);
    }

    #[test]
    fn rejects_wrong_session_count() {
        for len in [0usize, 5, 7] {
            let sessions = vec![SessionMark::default(); len];
            assert_eq!(
                classify(&sessions),
                Err(ClassifyError::InvalidInput {
                    expected: 6,
                    actual: len
                })
            );
        }
    }

    #[test]
    fn excellent_boundaries() {
        assert!(is_excellent(&record("a", shaped(1, 4))));
        assert!(!is_excellent(&record("b", shaped(1, 3))));
        assert!(!is_excellent(&record("c", shaped(2, 4))));
        // Good tier but not excellent.
        let r = record("d", shaped(2, 6));
        assert_eq!(classify(&r.sessions).unwrap().tier, Tier::Good);
        assert!(!is_excellent(&r));
    }

    #[test]
    fn aggregate_counts_any_presence_and_participation() {
        let records = vec![
            record("a", marks([false; 6], [false; 6])),
            record("b", shaped(5, 0)),
            record("c", marks([false; 6], [false, false, true, false, false, false])),
        ];
        let report = aggregate(&records);
        assert_eq!(
            report,
            AggregateReport {
                total: 3,
                present_at_least_once: 1,
                participated_at_least_once: 1,
            }
        );
        assert_eq!(aggregate(&Vec::new()), AggregateReport::default());
    }

    fn arb_sessions() -> impl Strategy<Value = Vec<SessionMark>> {
        prop::collection::vec(
            (any::<bool>(), any::<bool>()).prop_map(|(p, q)| SessionMark {
                present: p,
                participated: q,
            }),
            SESSION_COUNT,
        )
    }

    proptest! {
        #[test]
        fn counts_match_marks(sessions in arb_sessions()) {
            let c = classify(&sessions).unwrap();
            prop_assert_eq!(c.absences, sessions.iter().filter(|s| !s.present).count());
            prop_assert_eq!(c.participations, sessions.iter().filter(|s| s.participated).count());
            prop_assert_eq!(c.tier, Tier::from_absences(c.absences));
        }

        #[test]
        fn aggregate_is_order_independent(
            all in prop::collection::vec(arb_sessions(), 0..12),
            seed in any::<u64>(),
        ) {
            let records: Vec<AttendanceRecord> = all
                .into_iter()
                .enumerate()
                .map(|(i, s)| record(&i.to_string(), s))
                .collect();
            let mut shuffled = records.clone();
            if !shuffled.is_empty() {
                let k = (seed as usize) % shuffled.len();
                shuffled.rotate_left(k);
                shuffled.reverse();
            }
            prop_assert_eq!(aggregate(&records), aggregate(&shuffled));
        }
    }
}
