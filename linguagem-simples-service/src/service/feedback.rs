//! User ratings of simplified results.

use tracing::info;

use crate::db::NewFeedback;
use crate::error::{ServiceError, ServiceResult};
use crate::service::SimplifierService;

pub const MAX_COMMENT_CHARS: usize = 2000;

/// Opaque result id sent by the front-end
pub const MAX_HASH_CHARS: usize = 128;

impl SimplifierService {
    /// Store a rating and return the localized thank-you message.
    pub fn submit_feedback(
        &self,
        rating: i64,
        comment: Option<String>,
        hash: Option<String>,
        locale: &str,
    ) -> ServiceResult<String> {
        if !(1..=5).contains(&rating) {
            return Err(ServiceError::InvalidRequest {
                message: "rating must be between 1 and 5".to_string(),
            });
        }

        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(ref c) = comment
            && c.chars().count() > MAX_COMMENT_CHARS
        {
            return Err(ServiceError::InvalidRequest {
                message: format!("comment must be at most {} characters", MAX_COMMENT_CHARS),
            });
        }

        let result_hash = hash.map(|h| h.trim().to_string()).filter(|h| !h.is_empty());
        if let Some(ref h) = result_hash
            && h.chars().count() > MAX_HASH_CHARS
        {
            return Err(ServiceError::InvalidRequest {
                message: format!("hash must be at most {} characters", MAX_HASH_CHARS),
            });
        }

        let feedback = NewFeedback {
            rating: rating as u8,
            comment,
            result_hash,
        };
        let id = self.db.insert_feedback(&feedback)?;

        metrics::counter!("feedback_total", "rating" => rating.to_string()).increment(1);
        info!(
            feedback_id = %id,
            rating,
            has_comment = feedback.comment.is_some(),
            "Feedback received"
        );

        Ok(self.i18n.get(locale, "feedback-thanks", None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::service_with;

    #[test]
    fn test_submit_feedback() {
        let service = service_with("http://127.0.0.1:9", |_| {});

        let message = service
            .submit_feedback(5, Some("  Muito claro  ".to_string()), Some("a".repeat(64)), "pt-BR")
            .unwrap();
        assert_eq!(message, "Obrigado pela sua avaliação!");

        let message = service.submit_feedback(3, None, None, "en").unwrap();
        assert_eq!(message, "Thank you for your feedback!");

        let summary = service.db.feedback_summary().unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.with_comment, 1);
        assert_eq!(summary.average_rating, Some(4.0));
    }

    #[test]
    fn test_submit_feedback_accepts_front_end_result_id() {
        let service = service_with("http://127.0.0.1:9", |_| {});

        let message = service
            .submit_feedback(5, Some("bom".to_string()), Some("1760000000000".to_string()), "pt-BR")
            .unwrap();
        assert_eq!(message, "Obrigado pela sua avaliação!");
        assert_eq!(service.db.feedback_summary().unwrap().total, 1);
    }

    #[test]
    fn test_submit_feedback_validation() {
        let service = service_with("http://127.0.0.1:9", |_| {});

        for rating in [0, 6, -1] {
            assert!(matches!(
                service.submit_feedback(rating, None, None, "pt-BR"),
                Err(ServiceError::InvalidRequest { .. })
            ));
        }

        let long_comment = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert!(service
            .submit_feedback(4, Some(long_comment), None, "pt-BR")
            .is_err());
        assert!(service
            .submit_feedback(4, None, Some("f".repeat(MAX_HASH_CHARS + 1)), "pt-BR")
            .is_err());

        assert_eq!(service.db.feedback_summary().unwrap().total, 0);
    }
}
