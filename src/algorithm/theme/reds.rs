use once_cell::sync::Lazy;

use plotly::{
    common::{ColorBar, ColorScale, ColorScaleElement, Font, Label, Title},
    layout::{Axis, ColorAxis, HoverMode, LayoutColorScale, LayoutTemplate, Template},
};

/// White background, black axis lines and a light-to-dark red sequential scale.
pub static PLOTLY_REDS: Lazy<Template> = Lazy::new(|| {
    let layout_template = LayoutTemplate::new()
        .color_axis(ColorAxis::new().color_bar(ColorBar::new().outline_width(0)))
        .color_scale(
            LayoutColorScale::new().sequential(ColorScale::Vector(vec![
                ColorScaleElement(0., "#fff5f0".to_string()),
                ColorScaleElement(0.125, "#fee0d2".to_string()),
                ColorScaleElement(0.25, "#fcbba1".to_string()),
                ColorScaleElement(0.375, "#fc9272".to_string()),
                ColorScaleElement(0.5, "#fb6a4a".to_string()),
                ColorScaleElement(0.625, "#ef3b2c".to_string()),
                ColorScaleElement(0.75, "#cb181d".to_string()),
                ColorScaleElement(0.875, "#a50f15".to_string()),
                ColorScaleElement(1., "#67000d".to_string()),
            ])),
        )
        .colorway(vec![
            "#cb181d", "#fb6a4a", "#a50f15", "#fc9272", "#67000d", "#ef3b2c",
        ])
        .font(Font::new().color("#2a3f5f"))
        .hover_label(Label::new().align("left"))
        .hover_mode(HoverMode::Closest)
        .paper_background_color("#ffffff")
        .plot_background_color("#ffffff")
        .title(Title::new().x(0.05).font(Font::new().size(18)))
        .x_axis(
            Axis::new()
                .auto_margin(true)
                .line_color("black")
                .line_width(1)
                .zero_line(false)
                .show_grid(false)
                .show_line(true)
                .tick_font(Font::new().size(12))
                .title(Title::new().font(Font::new().size(14))),
        )
        .y_axis(
            Axis::new()
                .auto_margin(true)
                .line_color("black")
                .line_width(1)
                .zero_line(false)
                .show_grid(false)
                .show_line(true)
                .tick_font(Font::new().size(12))
                .title(Title::new().font(Font::new().size(14))),
        );
    Template::new().layout(layout_template)
});
