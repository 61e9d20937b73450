use std::sync::OnceLock;

use axum::response::Html;

use crate::jgrants::{SortField, SortOrder};
use crate::portal::PREFECTURES;

const INDEX_TEMPLATE: &str = include_str!("../../assets/index.html");

const REGIONS: [&str; 9] = [
    "全国",
    "北海道地方",
    "東北地方",
    "関東・甲信越地方",
    "東海・北陸地方",
    "近畿地方",
    "中国地方",
    "四国地方",
    "九州・沖縄地方",
];

pub const EMPLOYEE_COUNTS: [&str; 8] = [
    "従業員数の制約なし",
    "5名以下",
    "20名以下",
    "50名以下",
    "100名以下",
    "300名以下",
    "900名以下",
    "901名以上",
];

pub const USE_PURPOSES: [&str; 15] = [
    "新たな事業を行いたい",
    "販路拡大・海外展開をしたい",
    "イベント・事業運営支援がほしい",
    "事業を引き継ぎたい",
    "研究開発・実証事業を行いたい",
    "人材育成を行いたい",
    "資金繰りを改善したい",
    "設備整備・IT導入をしたい",
    "雇用・職場環境を改善したい",
    "エコ・SDGs活動支援がほしい",
    "災害（自然災害、感染症等）支援がほしい",
    "教育・子育て・少子化支援がほしい",
    "スポーツ・文化支援がほしい",
    "安全・防災対策支援がほしい",
    "まちづくり・地域振興支援がほしい",
];

static INDEX_PAGE: OnceLock<String> = OnceLock::new();

/// Target areas offered by the form: nationwide, regions, then every prefecture.
pub fn target_areas() -> impl Iterator<Item = &'static str> {
    REGIONS.into_iter().chain(PREFECTURES)
}

pub async fn index() -> Html<&'static str> {
    Html(index_page())
}

pub fn index_page() -> &'static str {
    INDEX_PAGE.get_or_init(render_index)
}

fn render_index() -> String {
    let sort_fields: Vec<(&str, &str)> = SortField::ALL
        .into_iter()
        .map(|field| (field.as_str(), field.label()))
        .collect();
    let sort_orders: Vec<(&str, &str)> = SortOrder::ALL
        .into_iter()
        .map(|order| (order.as_str(), order.label()))
        .collect();

    INDEX_TEMPLATE
        .replace(
            "{{target_area_options}}",
            &plain_options(target_areas()),
        )
        .replace(
            "{{employee_count_options}}",
            &plain_options(EMPLOYEE_COUNTS),
        )
        .replace("{{use_purpose_options}}", &plain_options(USE_PURPOSES))
        .replace("{{sort_field_options}}", &labelled_options(&sort_fields))
        .replace("{{sort_order_options}}", &labelled_options(&sort_orders))
}

fn plain_options<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values
        .into_iter()
        .map(|value| {
            let value = escape(value);
            format!("<option value=\"{value}\">{value}</option>")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn labelled_options(values: &[(&str, &str)]) -> String {
    values
        .iter()
        .map(|(value, label)| {
            format!(
                "<option value=\"{}\">{}</option>",
                escape(value),
                escape(label)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
