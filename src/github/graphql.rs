use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancel::CancelFlag;
use crate::error::{ExportError, Result};
use crate::github::client::GraphQlClient;
use crate::types::{
    FieldDataType, FieldDescriptor, FieldValue, ItemContent, ItemFieldValue, Milestone, Owner,
    OwnerKind, ProjectDescriptor, ProjectItem, PullRequestRef, SelectOption, TrackedContent,
    ViewDescriptor,
};

/// GitHub caps connection pages at 100 nodes.
pub const MAX_PAGE_SIZE: u32 = 100;

// ---------------------------------------------------------------------------
// GraphQL query strings
// ---------------------------------------------------------------------------

macro_rules! project_meta_fragment {
    () => {
        r"
fragment ProjectMeta on ProjectV2 {
  id
  title
  number
  url
  fields(first: $fieldLimit) {
    nodes {
      ... on ProjectV2FieldCommon { id name dataType }
      ... on ProjectV2SingleSelectField { options { id name } }
    }
  }
  views(first: $viewLimit) {
    nodes { id name filter }
  }
}
"
    };
}

const USER_PROJECT_QUERY: &str = concat!(
    r"
query UserProject($login: String!, $number: Int!, $fieldLimit: Int!, $viewLimit: Int!) {
  viewer { login }
  owner: user(login: $login) {
    projectV2(number: $number) { ...ProjectMeta }
  }
}
",
    project_meta_fragment!()
);

const ORGANIZATION_PROJECT_QUERY: &str = concat!(
    r"
query OrganizationProject($login: String!, $number: Int!, $fieldLimit: Int!, $viewLimit: Int!) {
  viewer { login }
  owner: organization(login: $login) {
    projectV2(number: $number) { ...ProjectMeta }
  }
}
",
    project_meta_fragment!()
);

const PROJECT_ITEMS_QUERY: &str = r"
query ProjectItems($projectId: ID!, $first: Int!, $after: String) {
  node(id: $projectId) {
    ... on ProjectV2 {
      items(first: $first, after: $after) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          content {
            __typename
            ... on Issue {
              number title url state
              repository { nameWithOwner }
              assignees(first: 10) { nodes { login } }
              labels(first: 20) { nodes { name } }
              milestone { title dueOn }
              createdAt updatedAt
            }
            ... on PullRequest {
              number title url state
              repository { nameWithOwner }
              assignees(first: 10) { nodes { login } }
              labels(first: 20) { nodes { name } }
              milestone { title dueOn }
              createdAt updatedAt
            }
            ... on DraftIssue { title }
          }
          fieldValues(first: 50) {
            nodes {
              __typename
              ... on ProjectV2ItemFieldValueCommon { field { ...FieldName } }
              ... on ProjectV2ItemFieldTextValue { text field { ...FieldName } }
              ... on ProjectV2ItemFieldNumberValue { number field { ...FieldName } }
              ... on ProjectV2ItemFieldDateValue { date field { ...FieldName } }
              ... on ProjectV2ItemFieldSingleSelectValue { name optionId field { ...FieldName } }
              ... on ProjectV2ItemFieldIterationValue { title startDate duration field { ...FieldName } }
              ... on ProjectV2ItemFieldMilestoneValue { milestone { title dueOn } field { ...FieldName } }
              ... on ProjectV2ItemFieldRepositoryValue { repository { nameWithOwner } field { ...FieldName } }
              ... on ProjectV2ItemFieldPullRequestValue { pullRequests(first: 10) { nodes { number url } } field { ...FieldName } }
              ... on ProjectV2ItemFieldUserValue { users(first: 10) { nodes { login } } field { ...FieldName } }
            }
          }
        }
      }
    }
  }
}

fragment FieldName on ProjectV2FieldConfiguration {
  ... on ProjectV2FieldCommon { name }
}
";

// ---------------------------------------------------------------------------
// Request variables
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectVariables<'a> {
    login: &'a str,
    number: u32,
    field_limit: u32,
    view_limit: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemsVariables<'a> {
    project_id: &'a str,
    first: u32,
    /// Serialized as `null` on the first page.
    after: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types (mirror the GraphQL response shape)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: serde::de::DeserializeOwned"))]
struct Connection<T> {
    #[serde(default)]
    nodes: Option<Vec<Option<T>>>,
}

impl<T> Connection<T> {
    fn into_nodes(self) -> impl Iterator<Item = T> {
        self.nodes.unwrap_or_default().into_iter().flatten()
    }
}

/// Flatten an optional connection into its non-null nodes.
fn nodes<T>(conn: Option<Connection<T>>) -> impl Iterator<Item = T> {
    conn.into_iter().flat_map(Connection::into_nodes)
}

/// Pagination info from GraphQL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "hasNextPage")]
    pub has_next_page: bool,
    #[serde(rename = "endCursor")]
    pub end_cursor: Option<String>,
}

// --- project metadata ---

#[derive(Debug, Deserialize)]
struct ProjectData {
    viewer: Option<RawLogin>,
    owner: Option<RawOwner>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    #[serde(rename = "projectV2")]
    project: Option<RawProject>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    id: String,
    #[serde(default)]
    title: String,
    number: u32,
    #[serde(default)]
    url: String,
    fields: Option<Connection<RawField>>,
    views: Option<Connection<RawView>>,
}

/// A field node; empty (`{}`) when the field type matched no fragment.
#[derive(Debug, Deserialize)]
struct RawField {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "dataType")]
    data_type: Option<FieldDataType>,
    options: Option<Vec<RawOption>>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawView {
    id: String,
    #[serde(default)]
    name: String,
    filter: Option<String>,
}

// --- items ---

#[derive(Debug, Deserialize)]
struct ItemsData {
    node: Option<RawProjectNode>,
}

#[derive(Debug, Deserialize)]
struct RawProjectNode {
    items: Option<RawItemConnection>,
}

#[derive(Debug, Deserialize)]
struct RawItemConnection {
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
    #[serde(default)]
    nodes: Option<Vec<Option<RawItem>>>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: String,
    content: Option<RawContent>,
    #[serde(rename = "fieldValues")]
    field_values: Option<Connection<RawFieldValue>>,
}

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(rename = "__typename")]
    typename: String,
    number: Option<u64>,
    title: Option<String>,
    url: Option<String>,
    state: Option<String>,
    repository: Option<RawRepository>,
    assignees: Option<Connection<RawLogin>>,
    labels: Option<Connection<RawName>>,
    milestone: Option<RawMilestone>,
    #[serde(rename = "createdAt")]
    created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFieldValue {
    #[serde(rename = "__typename")]
    typename: String,
    field: Option<RawName>,
    // Text
    text: Option<String>,
    // Number
    number: Option<f64>,
    // Date
    date: Option<String>,
    // SingleSelect
    name: Option<String>,
    #[serde(rename = "optionId")]
    option_id: Option<String>,
    // Iteration
    title: Option<String>,
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    duration: Option<u32>,
    // Milestone / Repository / PullRequest / User
    milestone: Option<RawMilestone>,
    repository: Option<RawRepository>,
    #[serde(rename = "pullRequests")]
    pull_requests: Option<Connection<RawPullRequestRef>>,
    users: Option<Connection<RawLogin>>,
}

#[derive(Debug, Deserialize)]
struct RawLogin {
    login: String,
}

/// Anything with a `name`, used for labels and field references.
#[derive(Debug, Deserialize)]
struct RawName {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    #[serde(rename = "nameWithOwner")]
    name_with_owner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMilestone {
    #[serde(default)]
    title: String,
    #[serde(rename = "dueOn")]
    due_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestRef {
    number: u64,
    url: Option<String>,
}

// ---------------------------------------------------------------------------
// Raw → domain conversion
// ---------------------------------------------------------------------------

impl RawMilestone {
    fn into_domain(self) -> Milestone {
        Milestone {
            title: self.title,
            due_on: self.due_on,
        }
    }
}

fn repo_name(repo: Option<RawRepository>) -> Option<String> {
    repo.and_then(|r| r.name_with_owner)
}

impl RawProject {
    fn into_domain(self, viewer_login: Option<String>) -> ProjectDescriptor {
        let fields = nodes(self.fields)
            .filter_map(|f| {
                let data_type = f.data_type.unwrap_or(FieldDataType::Unknown);
                Some(FieldDescriptor {
                    id: f.id?,
                    name: f.name?,
                    data_type,
                    options: f.options.map(|opts| {
                        opts.into_iter()
                            .map(|o| SelectOption {
                                id: o.id,
                                name: o.name,
                            })
                            .collect()
                    }),
                })
            })
            .collect();

        let views = nodes(self.views)
            .map(|v| ViewDescriptor {
                id: v.id,
                name: v.name,
                filter: v.filter,
            })
            .collect();

        ProjectDescriptor {
            id: self.id,
            title: self.title,
            number: self.number,
            url: self.url,
            fields,
            views,
            viewer_login,
        }
    }
}

impl RawContent {
    fn into_tracked(self) -> TrackedContent {
        TrackedContent {
            number: self.number,
            title: self.title,
            url: self.url,
            state: self.state,
            repo: repo_name(self.repository),
            assignees: nodes(self.assignees).map(|a| a.login).collect(),
            labels: nodes(self.labels).filter_map(|l| l.name).collect(),
            milestone: self.milestone.map(RawMilestone::into_domain),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn into_domain(self) -> ItemContent {
        match self.typename.as_str() {
            "Issue" => ItemContent::Issue(self.into_tracked()),
            "PullRequest" => ItemContent::PullRequest(self.into_tracked()),
            "DraftIssue" => ItemContent::DraftIssue { title: self.title },
            _ => ItemContent::Other {
                typename: Some(self.typename),
            },
        }
    }
}

impl RawFieldValue {
    fn into_domain(self) -> ItemFieldValue {
        let field_name = self.field.and_then(|f| f.name);
        let value = match self.typename.as_str() {
            "ProjectV2ItemFieldTextValue" => FieldValue::Text(self.text),
            "ProjectV2ItemFieldNumberValue" => FieldValue::Number(self.number),
            "ProjectV2ItemFieldDateValue" => FieldValue::Date(self.date),
            "ProjectV2ItemFieldSingleSelectValue" => FieldValue::SingleSelect {
                name: self.name,
                option_id: self.option_id,
            },
            "ProjectV2ItemFieldIterationValue" => FieldValue::Iteration {
                title: self.title,
                start_date: self.start_date,
                duration: self.duration,
            },
            "ProjectV2ItemFieldMilestoneValue" => {
                FieldValue::Milestone(self.milestone.map(RawMilestone::into_domain))
            }
            "ProjectV2ItemFieldRepositoryValue" => {
                FieldValue::Repository(repo_name(self.repository))
            }
            "ProjectV2ItemFieldPullRequestValue" => FieldValue::PullRequests(
                nodes(self.pull_requests)
                    .map(|pr| PullRequestRef {
                        number: pr.number,
                        url: pr.url,
                    })
                    .collect(),
            ),
            "ProjectV2ItemFieldUserValue" => {
                FieldValue::Users(nodes(self.users).map(|u| u.login).collect())
            }
            _ => FieldValue::Unsupported {
                typename: self.typename,
            },
        };
        ItemFieldValue { field_name, value }
    }
}

impl RawItem {
    fn into_domain(self) -> ProjectItem {
        ProjectItem {
            id: self.id,
            content: self
                .content
                .map_or(ItemContent::Other { typename: None }, RawContent::into_domain),
            field_values: nodes(self.field_values)
                .map(RawFieldValue::into_domain)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Caps for the single-round-trip project query.
#[derive(Debug, Clone, Copy)]
pub struct ResolveLimits {
    pub fields: u32,
    pub views: u32,
}

impl Default for ResolveLimits {
    fn default() -> Self {
        Self {
            fields: 100,
            views: 20,
        }
    }
}

/// Resolve a project's id, title, custom fields and saved views in one
/// request.
///
/// Fields and views beyond `limits` are not fetched.
pub async fn resolve_project(
    client: &GraphQlClient,
    owner: &Owner,
    number: u32,
    limits: ResolveLimits,
) -> Result<ProjectDescriptor> {
    let query = match owner.kind {
        OwnerKind::User => USER_PROJECT_QUERY,
        OwnerKind::Organization => ORGANIZATION_PROJECT_QUERY,
    };
    let variables = ProjectVariables {
        login: &owner.login,
        number,
        field_limit: limits.fields.clamp(1, MAX_PAGE_SIZE),
        view_limit: limits.views.clamp(1, MAX_PAGE_SIZE),
    };

    let not_found = || ExportError::NotFound {
        owner: owner.login.clone(),
        number,
    };

    let data: ProjectData = match client.execute(query, &variables).await {
        Ok(data) => data,
        Err(ExportError::Api { payload }) if is_owner_not_found(&payload) => {
            tracing::debug!("resolve: NOT_FOUND reported for owner path: {payload}");
            return Err(not_found());
        }
        Err(e) => return Err(e),
    };

    let raw = data
        .owner
        .and_then(|o| o.project)
        .ok_or_else(not_found)?;

    let project = raw.into_domain(data.viewer.map(|v| v.login));
    tracing::debug!(
        "resolve: project {} has {} fields, {} views",
        project.id,
        project.fields.len(),
        project.views.len()
    );
    Ok(project)
}

/// Whether every reported error is a `NOT_FOUND` on the `owner` path, the
/// shape GitHub uses for an unknown login or project number.
fn is_owner_not_found(payload: &str) -> bool {
    let Ok(Value::Array(errors)) = serde_json::from_str::<Value>(payload) else {
        return false;
    };
    !errors.is_empty()
        && errors.iter().all(|e| {
            e["type"] == "NOT_FOUND"
                && e["path"]
                    .as_array()
                    .and_then(|p| p.first())
                    .is_some_and(|head| *head == "owner")
        })
}

/// One page of project items.
#[derive(Debug)]
pub struct ItemsPage {
    pub items: Vec<ProjectItem>,
    pub page_info: PageInfo,
}

/// Fetch a single page of items starting after `after`.
pub async fn fetch_items_page(
    client: &GraphQlClient,
    project_id: &str,
    first: u32,
    after: Option<String>,
) -> Result<ItemsPage> {
    let variables = ItemsVariables {
        project_id,
        first,
        after,
    };

    let data: ItemsData = client.execute(PROJECT_ITEMS_QUERY, &variables).await?;

    let connection = data
        .node
        .and_then(|n| n.items)
        .ok_or_else(|| ExportError::Api {
            payload: format!("node {project_id} is not a project or has no items connection"),
        })?;

    let items = connection
        .nodes
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .map(RawItem::into_domain)
        .collect();

    Ok(ItemsPage {
        items,
        page_info: connection.page_info,
    })
}

/// Paging behaviour for [`list_items`].
#[derive(Debug, Clone)]
pub struct PageOptions {
    /// Items per request, clamped to `1..=100`.
    pub page_size: u32,
    /// Pause between consecutive page requests.
    pub throttle: Duration,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            throttle: Duration::from_millis(300),
        }
    }
}

/// Walk the whole item collection, one cursor-chained page at a time.
///
/// Pages are requested strictly in sequence. A failure on any page discards
/// everything fetched so far. `cancel` is checked before each request.
pub async fn list_items(
    client: &GraphQlClient,
    project_id: &str,
    options: &PageOptions,
    cancel: &CancelFlag,
) -> Result<Vec<ProjectItem>> {
    let page_size = options.page_size.clamp(1, MAX_PAGE_SIZE);
    let mut all_items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0u32;

    loop {
        if cancel.is_cancelled() {
            tracing::info!("list_items: cancelled after {pages} pages");
            return Err(ExportError::Cancelled);
        }

        let page = fetch_items_page(client, project_id, page_size, cursor.take()).await?;
        pages += 1;
        tracing::debug!(
            "list_items: page {pages} returned {} items (has_next={})",
            page.items.len(),
            page.page_info.has_next_page
        );
        all_items.extend(page.items);

        match page.page_info {
            PageInfo {
                has_next_page: true,
                end_cursor: Some(next),
            } => cursor = Some(next),
            _ => break,
        }

        if !options.throttle.is_zero() {
            tokio::time::sleep(options.throttle).await;
        }
    }

    tracing::debug!("list_items: {} items across {pages} pages", all_items.len());
    Ok(all_items)
}
