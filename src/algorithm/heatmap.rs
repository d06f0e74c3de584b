//! Crime heatmap and top district chart of a district table, rendered with plotly.
use super::theme::reds::PLOTLY_REDS;
use crate::model::district::DistrictTable;
use crate::model::error::DatasetError;
use plotly::{
    common::{ColorScale, ColorScalePalette, Marker},
    layout::Axis,
    Bar, HeatMap, Layout, Plot,
};

pub const EMPTY_SELECTION_MSG: &str = "No crime data available for this selection.";

/// Height of one heatmap row in pixels, a heatmap is never shorter than `MIN_HEATMAP_HEIGHT`.
const ROW_HEIGHT: usize = 35;
const MIN_HEATMAP_HEIGHT: usize = 600;
const HEATMAP_WIDTH: usize = 1200;

pub fn plot2json(plot: &Plot) -> String {
    plot.to_json()
}

pub fn plot2value(plot: &Plot) -> Result<serde_json::Value, DatasetError> {
    Ok(serde_json::from_str(&plot.to_json())?)
}

pub fn heatmap_title(table: &DistrictTable) -> String {
    format!("Crime Heatmap – {} ({})", table.state_name, table.year)
}

/// Districts by crime types, the last column is the total of each district.
pub fn crime_heatmap(table: &DistrictTable) -> Result<Plot, DatasetError> {
    if table.is_empty() {
        return Err(DatasetError::EmptySelection {
            msg: EMPTY_SELECTION_MSG.to_string(),
        });
    }

    // Plotly draws the first row at the bottom, keep the first district on top.
    let districts: Vec<String> = table
        .districts
        .iter()
        .rev()
        .map(|d| d.district_name.clone())
        .collect();
    let mut rows = table.heatmap_rows();
    rows.reverse();

    let trace = HeatMap::new(table.heatmap_columns(), districts, rows)
        .color_scale(ColorScale::Palette(ColorScalePalette::Reds))
        .name("Crimes");

    let title = heatmap_title(table);
    let height = MIN_HEATMAP_HEIGHT.max(table.districts.len() * ROW_HEIGHT);
    let layout = Layout::new()
        .template(&*PLOTLY_REDS)
        .title(title.as_str())
        .height(height)
        .width(HEATMAP_WIDTH)
        .x_axis(Axis::new().title("Crime Type"))
        .y_axis(Axis::new().title("District"));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);

    Ok(plot)
}

/// Bar chart of the `top_n` districts with the highest crime index.
pub fn top_districts_chart(table: &DistrictTable, top_n: usize) -> Result<Plot, DatasetError> {
    let top = table.top_districts(top_n);
    if top.is_empty() {
        return Err(DatasetError::EmptySelection {
            msg: EMPTY_SELECTION_MSG.to_string(),
        });
    }

    let names: Vec<String> = top.iter().map(|d| d.district_name.clone()).collect();
    let indexes: Vec<f64> = top.iter().map(|d| d.crime_index).collect();
    let tooltips: Vec<String> = top
        .iter()
        .map(|d| {
            format!(
                "District: {}<br>Total Crime: {}<br>Crime Index: {:.2}",
                d.district_name, d.total_crime as i64, d.crime_index
            )
        })
        .collect();

    let trace = Bar::new(names, indexes)
        .name("Crime Index")
        .marker(Marker::new().color("#cb181d"))
        .text_array(tooltips);

    let title = format!(
        "Top {} Districts by Crime Index – {} ({})",
        top.len(),
        table.state_name,
        table.year
    );
    let layout = Layout::new()
        .template(&*PLOTLY_REDS)
        .title(title.as_str())
        .x_axis(Axis::new().title("District"))
        .y_axis(Axis::new().title("Crime Index"))
        .show_legend(false);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);

    Ok(plot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::dataset::CrimeDataset;
    use crate::model::district::Grouping;

    fn table(year: i64) -> DistrictTable {
        CrimeDataset::from_csv_str(
            "year,state_name,district_name,murder,theft\n\
             2001,Kerala,Idukki,10,20\n\
             2001,Kerala,Kollam,1,5\n",
        )
        .unwrap()
        .district_table(year, "Kerala", Grouping::District)
        .unwrap()
    }

    #[test]
    fn test_crime_heatmap() {
        let plot = crime_heatmap(&table(2001)).unwrap();
        let json = plot2json(&plot);
        assert!(json.contains("Crime Heatmap – Kerala (2001)"));
        assert!(json.contains("total_crime"));
        assert!(json.contains("Crime Type"));

        let value = plot2value(&plot).unwrap();
        let trace = &value["data"][0];
        assert_eq!(trace["type"], "heatmap");
        // The first district is drawn on top.
        assert_eq!(trace["y"][1], "Idukki");
        assert_eq!(trace["z"][1][2], 30.0);
        assert_eq!(value["layout"]["height"], 600);
    }

    #[test]
    fn test_crime_heatmap_empty() {
        let err = crime_heatmap(&table(1999)).err().unwrap();
        assert_eq!(err.to_string(), EMPTY_SELECTION_MSG);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_top_districts_chart() {
        let plot = top_districts_chart(&table(2001), 10).unwrap();
        let value = plot2value(&plot).unwrap();
        assert_eq!(value["data"][0]["type"], "bar");
        assert_eq!(value["data"][0]["x"][0], "Idukki");
        assert_eq!(value["data"][0]["y"][0], 1.0);
    }
}
