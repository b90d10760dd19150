//! RecordsQuery

use crate::auth::validate_authorization_integrity;
use crate::error::{DwnError, Result};
use crate::hashing::compute_cid;
use crate::jws::{GeneralJws, Signer};
use crate::message::{DwnMessage, Interface, Method};
use crate::records::indexes::fields;
use crate::records::types::{
    DateSort, DescriptorCidPayload, RecordsQueryDescriptor, RecordsQueryFilter,
    RecordsQueryMessage, RecordsWriteMessage,
};
use crate::store::{Filter, RangeFilter};
use crate::time::{current_timestamp, parse_timestamp};
use std::collections::HashSet;

pub struct RecordsQueryOptions<'a> {
    pub date_created: Option<String>,
    pub filter: RecordsQueryFilter,
    pub date_sort: Option<DateSort>,
    pub authorization_signer: &'a dyn Signer,
}

impl<'a> RecordsQueryOptions<'a> {
    pub fn new(filter: RecordsQueryFilter, authorization_signer: &'a dyn Signer) -> Self {
        Self {
            date_created: None,
            filter,
            date_sort: None,
            authorization_signer,
        }
    }
}

/// A validated RecordsQuery message
#[derive(Debug, Clone)]
pub struct RecordsQuery {
    message: RecordsQueryMessage,
    author: String,
}

impl RecordsQuery {
    /// Validates an inbound query. Queries carry no extra authorization
    /// properties.
    pub fn parse(message: RecordsQueryMessage) -> Result<Self> {
        validate_authorization_integrity(&message.descriptor, &message.authorization, &HashSet::new())?;
        validate_descriptor_shape(&message.descriptor)?;
        let author = message.author()?;
        Ok(Self { message, author })
    }

    pub fn create(options: RecordsQueryOptions<'_>) -> Result<Self> {
        let descriptor = RecordsQueryDescriptor {
            interface: Interface::Records,
            method: Method::Query,
            date_created: options.date_created.unwrap_or_else(current_timestamp),
            filter: options.filter,
            date_sort: options.date_sort,
        };
        validate_descriptor_shape(&descriptor)?;

        let payload = DescriptorCidPayload {
            descriptor_cid: compute_cid(&descriptor)?,
        };
        let authorization = GeneralJws::create_for(&payload, &[options.authorization_signer])?;

        Ok(Self {
            message: RecordsQueryMessage {
                descriptor,
                authorization,
            },
            author: options.authorization_signer.did().to_string(),
        })
    }

    /// The tenant may issue any query. Anyone else may leave `recipient`
    /// unset, in which case visibility alone bounds what they see, but a
    /// `recipient` filter naming someone other than themselves is rejected.
    pub fn authorize(&self, tenant: &str) -> Result<()> {
        if self.author == tenant {
            return Ok(());
        }

        match &self.message.descriptor.filter.recipient {
            Some(recipient) if *recipient != self.author => Err(DwnError::RecipientFilterMismatch {
                author: self.author.clone(),
                recipient: recipient.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Translates the query filter into a store filter.
    ///
    /// `dateCreated` becomes the half-open range `[from, to)`; every other
    /// field is an exact match on the index of the same name.
    pub fn convert_filter(filter: &RecordsQueryFilter) -> Filter {
        let exact = [
            ("protocol", &filter.protocol),
            (fields::RECIPIENT, &filter.recipient),
            ("schema", &filter.schema),
            (fields::CONTEXT_ID, &filter.context_id),
            ("parentId", &filter.parent_id),
            (fields::RECORD_ID, &filter.record_id),
            ("dataFormat", &filter.data_format),
        ];

        let mut result = Filter::new();
        for (field, value) in exact {
            if let Some(value) = value {
                result = result.equal(field, value.as_str());
            }
        }

        if let Some(range) = &filter.date_created {
            if range.from.is_some() || range.to.is_some() {
                result = result.range(
                    fields::DATE_CREATED,
                    RangeFilter {
                        gte: range.from.as_deref().map(Into::into),
                        lt: range.to.as_deref().map(Into::into),
                        ..Default::default()
                    },
                );
            }
        }
        result
    }

    pub fn message(&self) -> &RecordsQueryMessage {
        &self.message
    }

    pub fn author(&self) -> &str {
        &self.author
    }
}

fn validate_descriptor_shape(descriptor: &RecordsQueryDescriptor) -> Result<()> {
    if descriptor.interface != Interface::Records || descriptor.method != Method::Query {
        return Err(DwnError::MalformedMessage(format!(
            "expected Records Query, got {} {}",
            descriptor.interface, descriptor.method
        )));
    }
    if parse_timestamp(&descriptor.date_created).is_none() {
        return Err(DwnError::MalformedMessage(format!(
            "dateCreated is not a valid timestamp: {}",
            descriptor.date_created
        )));
    }
    Ok(())
}

/// Orders query results.
///
/// Timestamps are compared as bytes, which is chronological for the fixed
/// width format. The published orderings drop unpublished records first.
pub fn sort_records(mut records: Vec<RecordsWriteMessage>, date_sort: DateSort) -> Vec<RecordsWriteMessage> {
    fn published_date(message: &RecordsWriteMessage) -> &[u8] {
        message
            .descriptor
            .date_published
            .as_deref()
            .unwrap_or_default()
            .as_bytes()
    }

    match date_sort {
        DateSort::CreatedAscending => {
            records.sort_by(|a, b| {
                a.descriptor.date_created.as_bytes().cmp(b.descriptor.date_created.as_bytes())
            });
        }
        DateSort::CreatedDescending => {
            records.sort_by(|a, b| {
                b.descriptor.date_created.as_bytes().cmp(a.descriptor.date_created.as_bytes())
            });
        }
        DateSort::PublishedAscending => {
            records.retain(|m| m.descriptor.is_published());
            records.sort_by(|a, b| published_date(a).cmp(published_date(b)));
        }
        DateSort::PublishedDescending => {
            records.retain(|m| m.descriptor.is_published());
            records.sort_by(|a, b| published_date(b).cmp(published_date(a)));
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jws::Ed25519Signer;
    use crate::records::types::DateRange;
    use crate::records::write::{RecordsWrite, RecordsWriteOptions};
    use crate::store::{FilterValue, IndexValue};
    use bytes::Bytes;

    fn record(
        signer: &Ed25519Signer,
        date_created: &str,
        published: Option<&str>,
    ) -> RecordsWriteMessage {
        RecordsWrite::create(RecordsWriteOptions {
            data: Some(Bytes::from_static(b"x")),
            date_created: Some(date_created.to_string()),
            date_modified: Some(date_created.to_string()),
            published: published.map(|_| true),
            date_published: published.map(str::to_string),
            ..RecordsWriteOptions::new("text/plain", signer)
        })
        .unwrap()
        .into_message()
    }

    #[test]
    fn test_create_and_parse() {
        let alice = Ed25519Signer::generate();
        let filter = RecordsQueryFilter {
            schema: Some("https://schema.org/Note".to_string()),
            ..Default::default()
        };
        let query = RecordsQuery::create(RecordsQueryOptions::new(filter, &alice)).unwrap();
        assert_eq!(query.author(), alice.did());

        let parsed = RecordsQuery::parse(query.message().clone()).unwrap();
        assert_eq!(parsed.author(), alice.did());

        let mut tampered = query.message().clone();
        tampered.descriptor.filter.schema = Some("https://schema.org/Photo".to_string());
        assert!(matches!(
            RecordsQuery::parse(tampered),
            Err(DwnError::AuthorizationMismatch(_))
        ));
    }

    #[test]
    fn test_authorize_recipient_filter() {
        let alice = Ed25519Signer::generate();
        let bob = Ed25519Signer::generate();

        let for_bob = RecordsQueryFilter {
            recipient: Some(bob.did().to_string()),
            ..Default::default()
        };
        let query = RecordsQuery::create(RecordsQueryOptions::new(for_bob.clone(), &bob)).unwrap();
        query.authorize(alice.did()).unwrap();

        // no recipient filter: allowed, visibility narrows the results
        let unfiltered =
            RecordsQuery::create(RecordsQueryOptions::new(RecordsQueryFilter::default(), &bob)).unwrap();
        unfiltered.authorize(alice.did()).unwrap();

        let carol = Ed25519Signer::generate();
        let query = RecordsQuery::create(RecordsQueryOptions::new(for_bob, &carol)).unwrap();
        assert!(matches!(
            query.authorize(alice.did()),
            Err(DwnError::RecipientFilterMismatch { .. })
        ));

        // the tenant may filter on anyone
        let query = RecordsQuery::create(RecordsQueryOptions::new(
            RecordsQueryFilter {
                recipient: Some(carol.did().to_string()),
                ..Default::default()
            },
            &alice,
        ))
        .unwrap();
        query.authorize(alice.did()).unwrap();
    }

    #[test]
    fn test_convert_filter() {
        let filter = RecordsQueryFilter {
            schema: Some("s".to_string()),
            record_id: Some("r".to_string()),
            date_created: Some(DateRange {
                from: Some("2023-01-01T00:00:00.000000Z".to_string()),
                to: None,
            }),
            ..Default::default()
        };
        let converted = RecordsQuery::convert_filter(&filter);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted.get("schema"), Some(&FilterValue::Equal(IndexValue::from("s"))));
        assert_eq!(converted.get("recordId"), Some(&FilterValue::Equal(IndexValue::from("r"))));
        assert_eq!(
            converted.get("dateCreated"),
            Some(&FilterValue::Range(RangeFilter {
                gte: Some("2023-01-01T00:00:00.000000Z".into()),
                ..Default::default()
            }))
        );

        let empty_range = RecordsQueryFilter {
            date_created: Some(DateRange::default()),
            ..Default::default()
        };
        assert!(RecordsQuery::convert_filter(&empty_range).is_empty());
    }

    #[test]
    fn test_sort_created() {
        let alice = Ed25519Signer::generate();
        let june = record(&alice, "2023-06-01T00:00:00.000000Z", None);
        let january = record(&alice, "2023-01-01T00:00:00.000000Z", None);

        let ascending = sort_records(vec![june.clone(), january.clone()], DateSort::CreatedAscending);
        assert_eq!(ascending, vec![january.clone(), june.clone()]);

        let descending = sort_records(vec![january.clone(), june.clone()], DateSort::CreatedDescending);
        assert_eq!(descending, vec![june, january]);
    }

    #[test]
    fn test_sort_published_drops_unpublished() {
        let alice = Ed25519Signer::generate();
        let published = record(
            &alice,
            "2023-01-01T00:00:00.000000Z",
            Some("2023-02-01T00:00:00.000000Z"),
        );
        let later = record(
            &alice,
            "2023-01-02T00:00:00.000000Z",
            Some("2023-03-01T00:00:00.000000Z"),
        );
        let unpublished = record(&alice, "2023-06-01T00:00:00.000000Z", None);

        let descending = sort_records(
            vec![published.clone(), unpublished.clone()],
            DateSort::PublishedDescending,
        );
        assert_eq!(descending, vec![published.clone()]);

        let ascending = sort_records(
            vec![later.clone(), unpublished, published.clone()],
            DateSort::PublishedAscending,
        );
        assert_eq!(ascending, vec![published, later]);
    }
}
