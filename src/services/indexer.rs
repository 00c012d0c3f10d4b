//! Indexing API client.
//!
//! Read-only GraphQL queries against the protocol indexer: project by id,
//! sucker group by id, participants, recent payments and the paginated
//! activity feed. The query/response shapes are an external contract; wire
//! structs live here and convert into the crate's domain models at the
//! boundary. Every request passes through the indexer circuit breaker.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{Config, chains};
use crate::error::TreasuryError;
use crate::models::event::ActivityEvent;
use crate::models::participant::Participant;
use crate::models::project::{Project, SuckerGroup};
use crate::services::breaker::CircuitBreaker;
use crate::services::rpc::BoxError;

/// Safety cap on cursor-following: one query can span at most this many
/// pages before the partial result is returned as-is.
const MAX_PAGES: usize = 20;
const PAGE_SIZE: u32 = 1_000;

/// Seam for the aggregator: the client behind it can be the real indexer
/// or an in-memory stub in tests.
#[async_trait]
pub trait ProjectIndex: Send + Sync {
    async fn project(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Option<Project>, TreasuryError>;

    async fn sucker_group(&self, group_id: &str) -> Result<Option<SuckerGroup>, TreasuryError>;

    async fn participants(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Vec<Participant>, TreasuryError>;
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    items: Vec<T>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectNode {
    project_id: u64,
    chain_id: u64,
    version: u32,
    owner: String,
    balance: String,
    volume: String,
    payments_count: u64,
    metadata_uri: Option<String>,
    sucker_group_id: Option<String>,
    erc20: Option<String>,
    erc20_symbol: Option<String>,
    erc20_supply: Option<String>,
    decimals: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuckerGroupNode {
    id: String,
    balance: String,
    volume: String,
    payments_count: u64,
    token_supply: String,
    projects: ProjectList,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    items: Vec<ProjectNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantNode {
    address: String,
    chain_id: u64,
    project_id: u64,
    balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayEventNode {
    chain_id: u64,
    project_id: u64,
    timestamp: i64,
    tx_hash: String,
    from: String,
    amount: String,
    memo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectData {
    project: Option<ProjectNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuckerGroupData {
    sucker_group: Option<SuckerGroupNode>,
}

#[derive(Debug, Deserialize)]
struct ParticipantsData {
    participants: Page<ParticipantNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayEventsData {
    pay_events: Page<PayEventNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityEventsData {
    activity_events: Page<ActivityEvent>,
}

const PROJECT_QUERY: &str = r#"
query Project($chainId: Int!, $projectId: Int!) {
  project(chainId: $chainId, projectId: $projectId) {
    projectId chainId version owner balance volume paymentsCount
    metadataUri suckerGroupId erc20 erc20Symbol erc20Supply decimals
  }
}"#;

const SUCKER_GROUP_QUERY: &str = r#"
query SuckerGroup($id: String!) {
  suckerGroup(id: $id) {
    id balance volume paymentsCount tokenSupply
    projects {
      items {
        projectId chainId version owner balance volume paymentsCount
        metadataUri suckerGroupId erc20 erc20Symbol erc20Supply decimals
      }
    }
  }
}"#;

const PARTICIPANTS_QUERY: &str = r#"
query Participants($chainId: Int!, $projectId: Int!, $limit: Int!, $after: String) {
  participants(
    where: { chainId: $chainId, projectId: $projectId, balance_gt: "0" }
    limit: $limit
    after: $after
  ) {
    items { address chainId projectId balance }
    pageInfo { hasNextPage endCursor }
  }
}"#;

const PAY_EVENTS_QUERY: &str = r#"
query PayEvents($chainId: Int!, $projectId: Int!, $limit: Int!) {
  payEvents(
    where: { chainId: $chainId, projectId: $projectId }
    orderBy: "timestamp"
    orderDirection: "desc"
    limit: $limit
  ) {
    items { chainId projectId timestamp txHash from amount memo }
    pageInfo { hasNextPage endCursor }
  }
}"#;

const ACTIVITY_EVENTS_QUERY: &str = r#"
query ActivityEvents($chainId: Int!, $projectId: Int!, $limit: Int!, $after: String) {
  activityEvents(
    where: { chainId: $chainId, projectId: $projectId }
    orderBy: "timestamp"
    orderDirection: "desc"
    limit: $limit
    after: $after
  ) {
    items {
      type chainId projectId timestamp txHash from amount memo
      cashOutCount reclaimAmount amountPaidOut symbol
    }
    pageInfo { hasNextPage endCursor }
  }
}"#;

pub struct IndexerClient {
    http: reqwest::Client,
    config: Arc<Config>,
    breaker: Arc<CircuitBreaker>,
}

impl IndexerClient {
    pub fn new(config: Arc<Config>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            breaker,
        }
    }

    /// Indexer deployment serving a chain. Testnet chains route to the
    /// mainnet API when the override flag is set.
    fn endpoint_for(&self, chain_id: u64) -> &str {
        if chains::is_testnet(chain_id) && !self.config.testnet_routes_to_mainnet {
            &self.config.indexer_testnet_url
        } else {
            &self.config.indexer_url
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        chain_id: u64,
        label: &str,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, TreasuryError> {
        let url = self.endpoint_for(chain_id).to_string();
        let body = serde_json::json!({ "query": query, "variables": variables.clone() });

        self.breaker
            .call(label, variables, || async {
                let response = self
                    .http
                    .post(&url)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| Box::new(e) as BoxError)?;

                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(format!("indexer HTTP {}: {}", status, text).into());
                }

                let parsed: GraphQlResponse<T> = response
                    .json()
                    .await
                    .map_err(|e| Box::new(e) as BoxError)?;

                if let Some(errors) = parsed.errors {
                    if !errors.is_empty() {
                        let messages: Vec<String> =
                            errors.into_iter().map(|e| e.message).collect();
                        return Err(format!("GraphQL errors: {}", messages.join("; ")).into());
                    }
                }

                parsed
                    .data
                    .ok_or_else(|| BoxError::from("GraphQL response carried no data"))
            })
            .await
            .into_result()
    }

    /// Most recent payments into a project, newest first.
    pub async fn recent_pay_events(
        &self,
        chain_id: u64,
        project_id: u64,
        limit: u32,
    ) -> Result<Vec<ActivityEvent>, TreasuryError> {
        let data: PayEventsData = self
            .post(
                chain_id,
                "indexer.payEvents",
                PAY_EVENTS_QUERY,
                serde_json::json!({
                    "chainId": chain_id,
                    "projectId": project_id,
                    "limit": limit,
                }),
            )
            .await?;

        Ok(data
            .pay_events
            .items
            .into_iter()
            .map(|node| ActivityEvent::Pay {
                chain_id: node.chain_id,
                project_id: node.project_id,
                timestamp: node.timestamp,
                tx_hash: node.tx_hash,
                from: node.from,
                amount: node.amount,
                memo: node.memo,
            })
            .collect())
    }

    /// Full historical activity feed, newest first, following the cursor
    /// until exhausted (bounded by [`MAX_PAGES`]).
    pub async fn activity_events(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Vec<ActivityEvent>, TreasuryError> {
        let mut events = Vec::new();
        let mut after: Option<String> = None;

        for page in 0..MAX_PAGES {
            let data: ActivityEventsData = self
                .post(
                    chain_id,
                    "indexer.activityEvents",
                    ACTIVITY_EVENTS_QUERY,
                    serde_json::json!({
                        "chainId": chain_id,
                        "projectId": project_id,
                        "limit": PAGE_SIZE,
                        "after": after,
                    }),
                )
                .await?;

            let page_data = data.activity_events;
            events.extend(page_data.items);

            if !page_data.page_info.has_next_page || page_data.page_info.end_cursor.is_none() {
                return Ok(events);
            }
            after = page_data.page_info.end_cursor;
            debug!(chain_id, project_id, page, "Following activity feed cursor");
        }

        warn!(
            chain_id,
            project_id,
            pages = MAX_PAGES,
            "Activity feed page cap reached, returning partial feed"
        );
        Ok(events)
    }
}

#[async_trait]
impl ProjectIndex for IndexerClient {
    async fn project(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Option<Project>, TreasuryError> {
        let data: ProjectData = self
            .post(
                chain_id,
                "indexer.project",
                PROJECT_QUERY,
                serde_json::json!({ "chainId": chain_id, "projectId": project_id }),
            )
            .await?;

        data.project.map(convert_project).transpose()
    }

    async fn sucker_group(&self, group_id: &str) -> Result<Option<SuckerGroup>, TreasuryError> {
        // Group ids are chain-agnostic; the mainnet deployment serves them.
        let data: SuckerGroupData = self
            .post(
                chains::ETHEREUM,
                "indexer.suckerGroup",
                SUCKER_GROUP_QUERY,
                serde_json::json!({ "id": group_id }),
            )
            .await?;

        let Some(node) = data.sucker_group else {
            return Ok(None);
        };
        Ok(Some(SuckerGroup {
            id: node.id,
            balance: parse_u256("suckerGroup.balance", &node.balance)?,
            volume: parse_u256("suckerGroup.volume", &node.volume)?,
            payments_count: node.payments_count,
            token_supply: parse_u256("suckerGroup.tokenSupply", &node.token_supply)?,
            projects: node
                .projects
                .items
                .into_iter()
                .map(convert_project)
                .collect::<Result<Vec<_>, _>>()?,
        }))
    }

    async fn participants(
        &self,
        chain_id: u64,
        project_id: u64,
    ) -> Result<Vec<Participant>, TreasuryError> {
        let mut participants = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let data: ParticipantsData = self
                .post(
                    chain_id,
                    "indexer.participants",
                    PARTICIPANTS_QUERY,
                    serde_json::json!({
                        "chainId": chain_id,
                        "projectId": project_id,
                        "limit": PAGE_SIZE,
                        "after": after,
                    }),
                )
                .await?;

            let page = data.participants;
            for node in page.items {
                participants.push(Participant {
                    balance: parse_u256("participant.balance", &node.balance)?,
                    address: node.address,
                    chain_id: node.chain_id,
                    project_id: node.project_id,
                });
            }

            if !page.page_info.has_next_page || page.page_info.end_cursor.is_none() {
                return Ok(participants);
            }
            after = page.page_info.end_cursor;
        }

        warn!(
            chain_id,
            project_id, "Participant page cap reached, returning partial holder set"
        );
        Ok(participants)
    }
}

fn convert_project(node: ProjectNode) -> Result<Project, TreasuryError> {
    let erc20 = match node.erc20.as_deref() {
        None | Some("") => None,
        Some(raw) => match Address::from_str(raw) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(address = raw, error = %e, "Unparseable project ERC-20 address");
                None
            }
        },
    };

    Ok(Project {
        project_id: node.project_id,
        chain_id: node.chain_id,
        version: node.version,
        owner: node.owner,
        balance: parse_u256("project.balance", &node.balance)?,
        volume: parse_u256("project.volume", &node.volume)?,
        payments_count: node.payments_count,
        metadata_uri: node.metadata_uri,
        sucker_group_id: node.sucker_group_id,
        erc20,
        erc20_symbol: node.erc20_symbol,
        token_supply: node
            .erc20_supply
            .as_deref()
            .map(|s| parse_u256("project.erc20Supply", s))
            .transpose()?
            .unwrap_or(U256::ZERO),
        decimals: node.decimals.unwrap_or(18),
    })
}

/// Indexer bigints arrive as decimal strings; anything else is corrupt.
fn parse_u256(field: &str, raw: &str) -> Result<U256, TreasuryError> {
    raw.parse::<U256>()
        .map_err(|e| TreasuryError::Decode(format!("{}: {:?} is not an integer: {}", field, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_node_converts_to_domain_model() {
        let node: ProjectNode = serde_json::from_str(
            r#"{
                "projectId": 12,
                "chainId": 8453,
                "version": 4,
                "owner": "0x1111111111111111111111111111111111111111",
                "balance": "1000000000000000000",
                "volume": "5000000000000000000",
                "paymentsCount": 42,
                "metadataUri": "ipfs://Qm",
                "suckerGroupId": "group-1",
                "erc20": "0x2222222222222222222222222222222222222222",
                "erc20Symbol": "NANA",
                "erc20Supply": "100",
                "decimals": 18
            }"#,
        )
        .unwrap();

        let project = convert_project(node).unwrap();
        assert_eq!(project.project_id, 12);
        assert_eq!(project.balance, U256::from(1_000_000_000_000_000_000u128));
        assert_eq!(project.sucker_group_id.as_deref(), Some("group-1"));
        assert_eq!(project.token_supply, U256::from(100u64));
        assert_eq!(project.decimals, 18);
    }

    #[test]
    fn malformed_bigint_is_a_decode_failure() {
        assert!(matches!(
            parse_u256("project.balance", "12.5"),
            Err(TreasuryError::Decode(_))
        ));
        assert!(parse_u256("project.balance", "12").is_ok());
    }

    #[test]
    fn unparseable_erc20_degrades_to_none() {
        let node: ProjectNode = serde_json::from_str(
            r#"{
                "projectId": 1, "chainId": 1, "version": 4, "owner": "0x0",
                "balance": "0", "volume": "0", "paymentsCount": 0,
                "metadataUri": null, "suckerGroupId": null,
                "erc20": "not-an-address", "erc20Symbol": null,
                "erc20Supply": null, "decimals": null
            }"#,
        )
        .unwrap();
        let project = convert_project(node).unwrap();
        assert_eq!(project.erc20, None);
        assert_eq!(project.decimals, 18);
    }

    #[test]
    fn page_info_drives_pagination() {
        let page: Page<ParticipantNode> = serde_json::from_str(
            r#"{
                "items": [
                    {"address": "0xAb", "chainId": 1, "projectId": 3, "balance": "10"}
                ],
                "pageInfo": {"hasNextPage": true, "endCursor": "abc"}
            }"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.page_info.has_next_page);
        assert_eq!(page.page_info.end_cursor.as_deref(), Some("abc"));
    }
}
