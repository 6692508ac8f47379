//! The export pipeline: resolve → paginate → flatten → filter → write.

use std::path::PathBuf;

use crate::cancel::CancelFlag;
use crate::config::types::ExportConfig;
use crate::error::Result;
use crate::filter::{STATUS_FIELD, ViewFilter};
use crate::flatten::{FlatRecord, flatten};
use crate::github::{GraphQlClient, list_items, resolve_project};
use crate::snapshot::{default_file_name, write_csv};
use crate::types::{Owner, ProjectDescriptor, ProjectItem, ViewDescriptor};

/// What to export.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub owner: Owner,
    pub project_number: u32,
    /// Saved view to emulate; blank is treated as absent.
    pub view_name: Option<String>,
    /// Explicit output path; defaults to `project_<N>_export.csv`.
    pub output: Option<PathBuf>,
}

impl ExportRequest {
    fn requested_view(&self) -> Option<&str> {
        self.view_name
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Where the snapshot will be written.
    pub fn output_path(&self, config: &ExportConfig) -> PathBuf {
        if let Some(path) = &self.output {
            return path.clone();
        }
        let name = default_file_name(self.project_number);
        match &config.output_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct ExportSummary {
    pub project: ProjectDescriptor,
    /// The matched saved view, if one was requested and found.
    pub view: Option<ViewDescriptor>,
    /// Filter actually applied (recognized terms only).
    pub filter: Option<ViewFilter>,
    /// Items returned by the API, before filtering.
    pub total_items: usize,
    pub rows_written: usize,
    pub output: PathBuf,
}

/// Match the requested view against the project's declared views.
///
/// An unknown view name is not an error: the export proceeds unfiltered.
pub fn select_view<'p>(
    project: &'p ProjectDescriptor,
    view_name: Option<&str>,
) -> Option<&'p ViewDescriptor> {
    let name = view_name?;
    let view = project.find_view(name);
    if view.is_none() {
        let known: Vec<_> = project.views.iter().map(|v| v.name.as_str()).collect();
        tracing::warn!(
            "view {name:?} not found in project #{} (known: {}); exporting unfiltered",
            project.number,
            known.join(", ")
        );
    }
    view
}

/// Build the filter for a view, or `None` when the view has no usable
/// filter text.
pub fn view_filter(view: &ViewDescriptor, viewer_login: Option<&str>) -> Option<ViewFilter> {
    let expr = view.filter.as_deref().map(str::trim).filter(|f| !f.is_empty())?;
    let filter = ViewFilter::parse(expr).with_viewer(viewer_login);
    if !filter.ignored().is_empty() {
        tracing::info!(
            "view {:?}: unsupported filter terms ignored: {}",
            view.name,
            filter.ignored().join(" ")
        );
    }
    Some(filter)
}

/// Flatten a whole item listing, preserving order.
pub fn flatten_all<'a>(items: impl IntoIterator<Item = &'a ProjectItem>) -> Vec<FlatRecord> {
    items.into_iter().map(flatten).collect()
}

/// Run one complete export.
///
/// Every step runs to completion before the next starts. Any failure aborts
/// the run before the output file is touched.
pub async fn run_export(
    client: &GraphQlClient,
    config: &ExportConfig,
    request: &ExportRequest,
    cancel: &CancelFlag,
) -> Result<ExportSummary> {
    let project = resolve_project(
        client,
        &request.owner,
        request.project_number,
        config.resolve_limits(),
    )
    .await?;
    tracing::info!(
        "export: project {:?} (#{}) resolved as {}",
        project.title,
        project.number,
        project.id
    );

    let view = select_view(&project, request.requested_view()).cloned();
    let filter = view
        .as_ref()
        .and_then(|v| view_filter(v, project.viewer_login.as_deref()));
    if let Some(filter) = &filter
        && !filter.status_values().is_empty()
        && project.field(STATUS_FIELD).is_none()
    {
        tracing::warn!(
            "project #{} has no {STATUS_FIELD:?} field; status terms will not narrow the export",
            project.number
        );
    }

    let items = list_items(client, &project.id, &config.page_options(), cancel).await?;
    let total_items = items.len();

    let mut records = flatten_all(&items);
    drop(items);

    if let Some(filter) = &filter {
        records = filter.apply(records);
        tracing::info!(
            "export: filter kept {} of {total_items} items",
            records.len()
        );
    }

    let output = request.output_path(config);
    let rows_written = write_csv(&records, &output)?;

    Ok(ExportSummary {
        project,
        view,
        filter,
        total_items,
        rows_written,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OwnerKind;

    fn request(output: Option<&str>) -> ExportRequest {
        ExportRequest {
            owner: Owner {
                login: "octo".to_owned(),
                kind: OwnerKind::User,
            },
            project_number: 7,
            view_name: Some("  ".to_owned()),
            output: output.map(PathBuf::from),
        }
    }

    fn project() -> ProjectDescriptor {
        ProjectDescriptor {
            id: "PVT_1".to_owned(),
            title: "Roadmap".to_owned(),
            number: 7,
            url: String::new(),
            fields: vec![],
            views: vec![
                ViewDescriptor {
                    id: "V1".to_owned(),
                    name: "Board".to_owned(),
                    filter: Some("status:Doing -label:wontfix".to_owned()),
                },
                ViewDescriptor {
                    id: "V2".to_owned(),
                    name: "Everything".to_owned(),
                    filter: Some("   ".to_owned()),
                },
            ],
            viewer_login: Some("octo".to_owned()),
        }
    }

    #[test]
    fn blank_view_name_is_absent() {
        assert_eq!(request(None).requested_view(), None);
    }

    #[test]
    fn output_path_defaults() {
        let config = ExportConfig::default();
        assert_eq!(
            request(None).output_path(&config),
            PathBuf::from("project_7_export.csv")
        );

        let config = ExportConfig {
            output_dir: Some(PathBuf::from("/tmp/out")),
            ..ExportConfig::default()
        };
        assert_eq!(
            request(None).output_path(&config),
            PathBuf::from("/tmp/out/project_7_export.csv")
        );
        assert_eq!(
            request(Some("x.csv")).output_path(&config),
            PathBuf::from("x.csv")
        );
    }

    #[test]
    fn select_view_unknown_name_is_none() {
        let project = project();
        assert!(select_view(&project, Some("Backlog")).is_none());
        assert_eq!(select_view(&project, Some("board")).map(|v| v.id.as_str()), Some("V1"));
        assert!(select_view(&project, None).is_none());
    }

    #[test]
    fn view_filter_keeps_recognized_terms() {
        let project = project();
        let filter = view_filter(&project.views[0], Some("octo")).unwrap();
        assert_eq!(filter.status_values(), ["doing"]);
        assert_eq!(filter.ignored(), ["-label:wontfix"]);
        assert!(view_filter(&project.views[1], None).is_none());
    }
}
