use std::cmp::Ordering;

use time::{format_description::FormatItem, macros::format_description};

pub use postwall_api_types::{Post, PostFields, PostId};

use super::error::FieldError;

pub const DISPLAY_TIME_FORMAT: &[FormatItem<'static>] = format_description!(
    "[month repr:short] [day padding:none], [year] [hour]:[minute] UTC"
);

/// Collection order: most recently created first, ties broken by id descending.
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(newest_first);
}

/// Required-field checks applied before any write leaves the client.
pub fn validate_fields(fields: &PostFields) -> Result<(), FieldError> {
    if fields.author.trim().is_empty() {
        return Err(FieldError::MissingAuthor);
    }
    if fields.content.trim().is_empty() {
        return Err(FieldError::MissingContent);
    }
    Ok(())
}

/// Trim the author and collapse a blank image URL to "no image".
pub fn normalize_fields(fields: PostFields) -> PostFields {
    let PostFields {
        author,
        content,
        image_url,
    } = fields;

    PostFields {
        author: author.trim().to_string(),
        content,
        image_url: image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime, macros::datetime};

    use super::*;

    fn post(id: &str, created_at: OffsetDateTime) -> Post {
        Post {
            id: PostId::from(id),
            author: "ana".to_string(),
            content: format!("post {id}"),
            image_url: None,
            created_at,
            modified_at: None,
        }
    }

    #[test]
    fn sorts_by_creation_descending() {
        let base = datetime!(2024-05-01 12:00 UTC);
        let mut posts = vec![
            post("1", base),
            post("3", base + Duration::hours(2)),
            post("2", base + Duration::hours(1)),
        ];

        sort_newest_first(&mut posts);

        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["3", "2", "1"]);
        assert!(
            posts
                .windows(2)
                .all(|pair| pair[0].created_at > pair[1].created_at)
        );
    }

    #[test]
    fn equal_timestamps_fall_back_to_id_descending() {
        let at = datetime!(2024-05-01 12:00 UTC);
        let mut posts = vec![post("2", at), post("10", at), post("9", at)];

        sort_newest_first(&mut posts);

        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["10", "9", "2"]);
    }

    #[test]
    fn validation_requires_author_and_content() {
        assert_eq!(
            validate_fields(&PostFields::new("  ", "hi")),
            Err(FieldError::MissingAuthor)
        );
        assert_eq!(
            validate_fields(&PostFields::new("ana", "\n")),
            Err(FieldError::MissingContent)
        );
        assert_eq!(validate_fields(&PostFields::new("ana", "hi")), Ok(()));
    }

    #[test]
    fn normalize_drops_blank_images() {
        let fields = PostFields {
            author: " ana ".to_string(),
            content: "hi".to_string(),
            image_url: Some("   ".to_string()),
        };

        let normalized = normalize_fields(fields);
        assert_eq!(normalized.author, "ana");
        assert_eq!(normalized.image_url, None);
    }
}
