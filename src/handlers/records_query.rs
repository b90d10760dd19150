//! RecordsQuery handler
//!
//! The tenant sees every latest record state that matches. Anyone else sees
//! published records, unpublished records addressed to them, and unpublished
//! records they wrote.

use super::MessageReply;
use crate::auth::authenticate;
use crate::did::DidResolver;
use crate::error::Result;
use crate::message::{Interface, Method};
use crate::records::indexes::fields;
use crate::records::query::{sort_records, RecordsQuery};
use crate::records::types::{QueryResultEntry, RecordsQueryMessage, RecordsWriteMessage};
use crate::store::{Filter, MessageStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RecordsQueryHandler {
    did_resolver: Arc<dyn DidResolver>,
    message_store: Arc<dyn MessageStore>,
}

impl RecordsQueryHandler {
    pub fn new(did_resolver: Arc<dyn DidResolver>, message_store: Arc<dyn MessageStore>) -> Self {
        Self {
            did_resolver,
            message_store,
        }
    }

    pub async fn handle(&self, tenant: &str, message: RecordsQueryMessage) -> MessageReply {
        let query = match RecordsQuery::parse(message) {
            Ok(query) => query,
            Err(e) => {
                debug!(tenant = %tenant, error = %e, "Rejected malformed RecordsQuery");
                return MessageReply::new(400, e.to_string());
            }
        };

        let authorized = async {
            authenticate(&query.message().authorization, self.did_resolver.as_ref()).await?;
            query.authorize(tenant)
        };
        if let Err(e) = authorized.await {
            info!(tenant = %tenant, requester = %query.author(), error = %e, "Unauthorized RecordsQuery");
            return MessageReply::new(401, e.to_string());
        }

        let records = if query.author() == tenant {
            self.fetch_as_owner(tenant, &query).await
        } else {
            self.fetch_as_non_owner(tenant, &query).await
        };
        let mut records = match records {
            Ok(records) => records,
            Err(e) => {
                warn!(tenant = %tenant, error = %e, "RecordsQuery store failure");
                return MessageReply::from(e);
            }
        };

        if let Some(date_sort) = query.message().descriptor.date_sort {
            records = sort_records(records, date_sort);
        }

        debug!(tenant = %tenant, requester = %query.author(), entries = records.len(), "Answered RecordsQuery");
        // authorization is signature metadata, not record content
        let entries = records.into_iter().map(QueryResultEntry::from).collect();
        MessageReply::with_entries(entries)
    }

    /// Base filter: the query's own constraints over latest record states
    fn latest_writes_filter(query: &RecordsQuery) -> Filter {
        RecordsQuery::convert_filter(&query.message().descriptor.filter)
            .equal(fields::INTERFACE, Interface::Records.to_string())
            .equal(fields::METHOD, Method::Write.to_string())
            .equal(fields::IS_LATEST_BASE_STATE, true)
    }

    async fn fetch_as_owner(&self, tenant: &str, query: &RecordsQuery) -> Result<Vec<RecordsWriteMessage>> {
        self.message_store
            .query(tenant, &Self::latest_writes_filter(query))
            .await
    }

    /// Union of three disjoint sets: published, unpublished addressed to the
    /// requester, unpublished authored by the requester.
    async fn fetch_as_non_owner(
        &self,
        tenant: &str,
        query: &RecordsQuery,
    ) -> Result<Vec<RecordsWriteMessage>> {
        let base = Self::latest_writes_filter(query);

        let published = base.clone().equal(fields::PUBLISHED, true);
        let for_requester = base
            .clone()
            .equal(fields::PUBLISHED, false)
            .equal(fields::RECIPIENT, query.author());
        let by_requester = base
            .equal(fields::PUBLISHED, false)
            .equal(fields::AUTHOR, query.author());

        let mut records = self.message_store.query(tenant, &published).await?;
        records.extend(self.message_store.query(tenant, &for_requester).await?);
        records.extend(self.message_store.query(tenant, &by_requester).await?);
        Ok(records)
    }
}
