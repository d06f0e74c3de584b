//! This module defines the routes of the API.

use crate::algorithm::geo::{map_heat_layer, MapHeatLayer};
use crate::algorithm::heatmap::{crime_heatmap, plot2value, top_districts_chart};
use crate::api::schema::{
    ApiTags, DeleteResponse, GetResponse, PostResponse, Selection,
};
use crate::model::dataset::CrimeDataset;
use crate::model::district::{DistrictRank, DistrictTable, Grouping};
use crate::model::error::DatasetError;
use crate::model::store::{DatasetInfo, DatasetStore};
use log::{debug, info};
use poem::web::Data;
use poem::Body;
use poem_openapi::{param::Path, param::Query, OpenApi, OpenApiService};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 64 * 1024 * 1024;
const DEFAULT_DATASET_NAME: &str = "unnamed";

/// Limits applied to the requests, shared with the handlers as request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub max_upload_size: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

fn district_table(
    store: &DatasetStore,
    id: &str,
    selection: &Selection,
    grouping: Grouping,
) -> Result<DistrictTable, DatasetError> {
    let stored = store.get(id)?;
    stored
        .dataset
        .district_table(selection.year, &selection.state, grouping)
}

/// Read at most `limit` bytes of a request body as utf-8 text.
async fn read_limited(body: Body, limit: usize) -> Result<String, DatasetError> {
    let mut buf = Vec::new();
    body.into_async_read()
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut buf)
        .await?;

    if buf.len() > limit {
        return Err(DatasetError::DatasetTooLarge {
            size: buf.len(),
            limit,
        });
    }

    String::from_utf8(buf).map_err(|_| DatasetError::InvalidEncoding)
}

fn top_n_param(top_n: Option<u64>) -> Result<Option<usize>, String> {
    top_n
        .map(|n| {
            usize::try_from(n).map_err(|_| format!("The number of districts is too large: {}", n))
        })
        .transpose()
}

pub struct CrimeScopeApi;

pub fn api_service(server: &str) -> OpenApiService<CrimeScopeApi, ()> {
    OpenApiService::new(CrimeScopeApi, "CrimeScope", "v0.1.0")
        .summary("A RESTful API Service for CrimeScope.")
        .description("Year-wise and state-wise crime analysis, district heatmaps and crime index rankings.")
        .server(server)
}

#[OpenApi]
impl CrimeScopeApi {
    /// Call `/api/v1/datasets` with a csv body to upload a crime dataset.
    ///
    /// The body is read up to the upload limit, a larger body is rejected before it is fully read.
    #[oai(
        path = "/api/v1/datasets",
        method = "post",
        tag = "ApiTags::Dataset",
        operation_id = "uploadDataset"
    )]
    async fn upload_dataset(
        &self,
        store: Data<&Arc<DatasetStore>>,
        settings: Data<&ApiSettings>,
        name: Query<Option<String>>,
        body: Body,
    ) -> PostResponse<DatasetInfo> {
        let body = match read_limited(body, settings.max_upload_size).await {
            Ok(body) => body,
            Err(e) => return PostResponse::bad_request(e.to_string()),
        };

        let name = name.0.unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string());
        let dataset = match CrimeDataset::from_csv_str(&body) {
            Ok(dataset) => dataset,
            Err(e) => return PostResponse::bad_request(format!("Failed to load dataset: {}", e)),
        };

        match store.insert(&name, dataset) {
            Ok(info) => {
                info!("Dataset {} ({}) uploaded.", info.name, info.id);
                PostResponse::created(info)
            }
            Err(e) => PostResponse::bad_request(format!("Failed to store dataset: {}", e)),
        }
    }

    /// Call `/api/v1/datasets` to list the uploaded datasets, oldest first.
    #[oai(
        path = "/api/v1/datasets",
        method = "get",
        tag = "ApiTags::Dataset",
        operation_id = "fetchDatasets"
    )]
    async fn fetch_datasets(&self, store: Data<&Arc<DatasetStore>>) -> GetResponse<Vec<DatasetInfo>> {
        match store.list() {
            Ok(datasets) => GetResponse::ok(datasets),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id` to fetch the summary of a dataset.
    #[oai(
        path = "/api/v1/datasets/:id",
        method = "get",
        tag = "ApiTags::Dataset",
        operation_id = "fetchDataset"
    )]
    async fn fetch_dataset(
        &self,
        store: Data<&Arc<DatasetStore>>,
        id: Path<String>,
    ) -> GetResponse<DatasetInfo> {
        match store.get(&id.0) {
            Ok(stored) => GetResponse::ok(stored.info.clone()),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id` to delete a dataset.
    #[oai(
        path = "/api/v1/datasets/:id",
        method = "delete",
        tag = "ApiTags::Dataset",
        operation_id = "deleteDataset"
    )]
    async fn delete_dataset(&self, store: Data<&Arc<DatasetStore>>, id: Path<String>) -> DeleteResponse {
        match store.remove(&id.0) {
            Ok(_) => {
                info!("Dataset {} deleted.", id.0);
                DeleteResponse::NoContent
            }
            Err(e) => DeleteResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id/years` to fetch the years found in a dataset.
    #[oai(
        path = "/api/v1/datasets/:id/years",
        method = "get",
        tag = "ApiTags::Dataset",
        operation_id = "fetchYears"
    )]
    async fn fetch_years(&self, store: Data<&Arc<DatasetStore>>, id: Path<String>) -> GetResponse<Vec<i64>> {
        match store.get(&id.0) {
            Ok(stored) => GetResponse::ok(stored.dataset.years()),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id/states` with a year to fetch the states which have records in that year.
    #[oai(
        path = "/api/v1/datasets/:id/states",
        method = "get",
        tag = "ApiTags::Dataset",
        operation_id = "fetchStates"
    )]
    async fn fetch_states(
        &self,
        store: Data<&Arc<DatasetStore>>,
        id: Path<String>,
        year: Query<i64>,
    ) -> GetResponse<Vec<String>> {
        match store.get(&id.0) {
            Ok(stored) => GetResponse::ok(stored.dataset.states(year.0)),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id/districts` with a year and a state to fetch the district level crime table.
    #[oai(
        path = "/api/v1/datasets/:id/districts",
        method = "get",
        tag = "ApiTags::Analysis",
        operation_id = "fetchDistricts"
    )]
    async fn fetch_districts(
        &self,
        store: Data<&Arc<DatasetStore>>,
        id: Path<String>,
        year: Query<i64>,
        state: Query<String>,
        with_coordinates: Query<Option<bool>>,
    ) -> GetResponse<DistrictTable> {
        let selection = match Selection::new(year.0, state.0, None) {
            Ok(selection) => selection,
            Err(err) => return GetResponse::bad_request(err),
        };
        let grouping = if with_coordinates.0.unwrap_or(false) {
            Grouping::DistrictWithCoordinates
        } else {
            Grouping::District
        };

        match district_table(&store, &id.0, &selection, grouping) {
            Ok(table) => GetResponse::ok(table),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id/heatmap` with a year and a state to fetch the crime heatmap as a plotly figure.
    #[oai(
        path = "/api/v1/datasets/:id/heatmap",
        method = "get",
        tag = "ApiTags::Analysis",
        operation_id = "fetchHeatmap"
    )]
    async fn fetch_heatmap(
        &self,
        store: Data<&Arc<DatasetStore>>,
        id: Path<String>,
        year: Query<i64>,
        state: Query<String>,
    ) -> GetResponse<serde_json::Value> {
        let selection = match Selection::new(year.0, state.0, None) {
            Ok(selection) => selection,
            Err(err) => return GetResponse::bad_request(err),
        };

        let plot = district_table(&store, &id.0, &selection, Grouping::District)
            .and_then(|table| crime_heatmap(&table))
            .and_then(|plot| plot2value(&plot));

        match plot {
            Ok(plot) => GetResponse::ok(plot),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id/map` with a year and a state to fetch the map heat layer. The dataset needs lat and lon columns.
    #[oai(
        path = "/api/v1/datasets/:id/map",
        method = "get",
        tag = "ApiTags::Analysis",
        operation_id = "fetchMap"
    )]
    async fn fetch_map(
        &self,
        store: Data<&Arc<DatasetStore>>,
        id: Path<String>,
        year: Query<i64>,
        state: Query<String>,
    ) -> GetResponse<MapHeatLayer> {
        let selection = match Selection::new(year.0, state.0, None) {
            Ok(selection) => selection,
            Err(err) => return GetResponse::bad_request(err),
        };

        let layer = district_table(&store, &id.0, &selection, Grouping::DistrictWithCoordinates)
            .and_then(|table| map_heat_layer(&table));

        match layer {
            Ok(layer) => GetResponse::ok(layer),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id/top-districts` with a year, a state and top_n (5-25, 10 by default) to rank the districts by crime index.
    #[oai(
        path = "/api/v1/datasets/:id/top-districts",
        method = "get",
        tag = "ApiTags::Analysis",
        operation_id = "fetchTopDistricts"
    )]
    async fn fetch_top_districts(
        &self,
        store: Data<&Arc<DatasetStore>>,
        id: Path<String>,
        year: Query<i64>,
        state: Query<String>,
        top_n: Query<Option<u64>>,
    ) -> GetResponse<Vec<DistrictRank>> {
        let selection = match top_n_param(top_n.0).and_then(|n| Selection::new(year.0, state.0, n)) {
            Ok(selection) => selection,
            Err(err) => return GetResponse::bad_request(err),
        };
        debug!("Rank the top {} districts.", selection.top_n());

        match district_table(&store, &id.0, &selection, Grouping::District) {
            Ok(table) => GetResponse::ok(table.ranking(selection.top_n())),
            Err(e) => GetResponse::from_error(e),
        }
    }

    /// Call `/api/v1/datasets/:id/top-districts-chart` with the same params as `/top-districts` to fetch a plotly bar chart.
    #[oai(
        path = "/api/v1/datasets/:id/top-districts-chart",
        method = "get",
        tag = "ApiTags::Analysis",
        operation_id = "fetchTopDistrictsChart"
    )]
    async fn fetch_top_districts_chart(
        &self,
        store: Data<&Arc<DatasetStore>>,
        id: Path<String>,
        year: Query<i64>,
        state: Query<String>,
        top_n: Query<Option<u64>>,
    ) -> GetResponse<serde_json::Value> {
        let selection = match top_n_param(top_n.0).and_then(|n| Selection::new(year.0, state.0, n)) {
            Ok(selection) => selection,
            Err(err) => return GetResponse::bad_request(err),
        };

        let plot = district_table(&store, &id.0, &selection, Grouping::District)
            .and_then(|table| top_districts_chart(&table, selection.top_n()))
            .and_then(|plot| plot2value(&plot));

        match plot {
            Ok(plot) => GetResponse::ok(plot),
            Err(e) => GetResponse::from_error(e),
        }
    }
}
