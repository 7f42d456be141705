//! Aggregates behind the dashboard cards: monthly sales, top clients, top
//! sellers and the list of years with data.

use tracing::{info, warn};

use crate::api::{AtosClient, BarResponse, PieResponse};
use crate::chart::{
    bar_series, client_pie_series, percent_of, seller_pie_series, ChartSeries,
};
use crate::error::ApiResult;

pub const LOAD_ERROR_TEXT: &str = "Erro ao carregar dados";
pub const DEFAULT_SALES_SUBTITLE: &str = "Últimos 12 meses";
pub const DEFAULT_X_LABEL: &str = "Mês/Ano";
pub const DEFAULT_Y_LABEL: &str = "Total de Vendas";

/// Years offered when the API has none to list.
pub const FALLBACK_YEARS: [&str; 4] = ["2025", "2024", "2023", "2022"];

#[derive(Debug, Clone, PartialEq)]
pub struct SalesOverview {
    pub subtitle: String,
    pub series: ChartSeries,
    pub x_label: String,
    pub y_label: String,
    pub total: f64,
    pub average: f64,
}

impl SalesOverview {
    pub fn from_response(response: &BarResponse) -> Self {
        let series = bar_series(&response.data);
        let non_blank = |s: &Option<String>, default: &str| {
            s.clone()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            subtitle: non_blank(&response.message, DEFAULT_SALES_SUBTITLE),
            x_label: non_blank(&response.x_axis, DEFAULT_X_LABEL),
            y_label: non_blank(&response.y_axis, DEFAULT_Y_LABEL),
            total: series.total(),
            average: series.average(),
            series,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientShare {
    pub name: String,
    pub value: f64,
    pub percent: f64,
    pub orders: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientCapture {
    pub clients: Vec<ClientShare>,
    pub series: ChartSeries,
    pub total: f64,
}

impl ClientCapture {
    pub fn from_response(response: &PieResponse) -> Self {
        let series = client_pie_series(&response.data_clients);
        let total = series.total();
        let clients = response
            .data_clients
            .iter()
            .map(|c| ClientShare {
                name: c.client_name.clone(),
                value: c.value(),
                percent: percent_of(c.value(), total),
                orders: c.orders(),
            })
            .collect();

        Self {
            clients,
            series,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellerShare {
    pub name: String,
    pub total_sold: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SellerRanking {
    pub sellers: Vec<SellerShare>,
    pub total: f64,
}

impl SellerRanking {
    pub fn from_response(response: &PieResponse) -> Self {
        let series = seller_pie_series(&response.data_sellers);
        let total = series.total();
        let sellers = response
            .data_sellers
            .iter()
            .map(|s| SellerShare {
                name: s.seller_name.clone(),
                total_sold: s.total(),
                percent: percent_of(s.total(), total),
            })
            .collect();

        Self { sellers, total }
    }
}

/// Everything the dashboard shows. Each card fails on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub sales: Result<SalesOverview, String>,
    pub clients: Result<ClientCapture, String>,
    pub sellers: Result<SellerRanking, String>,
    pub years: Vec<String>,
}

impl Dashboard {
    /// Fetch all cards concurrently.
    pub async fn load(client: &AtosClient) -> Self {
        let (bar, pie, years) = tokio::join!(client.bar_static(), client.pie_static(), client.years());
        let dashboard = Self::from_responses(bar, pie, years);
        info!(
            sales = dashboard.sales.is_ok(),
            clients = dashboard.clients.is_ok(),
            years = dashboard.years.len(),
            "dashboard loaded"
        );
        dashboard
    }

    pub fn from_responses(
        bar: ApiResult<BarResponse>,
        pie: ApiResult<PieResponse>,
        years: ApiResult<Vec<String>>,
    ) -> Self {
        let sales = bar
            .map(|b| SalesOverview::from_response(&b))
            .map_err(|e| {
                warn!(error = %e, "sales overview unavailable");
                LOAD_ERROR_TEXT.to_string()
            });

        let (clients, sellers) = match pie {
            Ok(p) => (
                Ok(ClientCapture::from_response(&p)),
                Ok(SellerRanking::from_response(&p)),
            ),
            Err(e) => {
                warn!(error = %e, "client capture unavailable");
                (Err(LOAD_ERROR_TEXT.to_string()), Err(LOAD_ERROR_TEXT.to_string()))
            }
        };

        let years = years.unwrap_or_else(|e| {
            warn!(error = %e, "years unavailable");
            Vec::new()
        });

        Self {
            sales,
            clients,
            sellers,
            years,
        }
    }

    /// Years for the selector: the API list, or a fixed fallback.
    pub fn selectable_years(&self) -> Vec<String> {
        if self.years.is_empty() {
            FALLBACK_YEARS.iter().map(|y| y.to_string()).collect()
        } else {
            self.years.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use serde_json::json;

    fn bar() -> BarResponse {
        serde_json::from_value(json!({
            "type": "bar",
            "message": "",
            "data": [
                {"month_label": "2025-01", "total_sales": 100},
                {"month_label": "2025-02", "total_sales": {"parsedValue": 200}}
            ],
            "x_axis": null,
            "y_axis": "Faturamento"
        }))
        .unwrap()
    }

    fn pie() -> PieResponse {
        serde_json::from_value(json!({
            "type": "pie",
            "data_clients": [
                {"client_name": "Acme", "value_purchased": 300.0, "total_orders": 3},
                {"client_name": "Beta", "value_purchased": 100.0, "total_orders": 1}
            ],
            "data_sellers": [
                {"seller_name": "Ana", "total_sold": 50.0}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_sales_overview() {
        let overview = SalesOverview::from_response(&bar());
        assert_eq!(overview.series.labels, vec!["Jan/2025", "Fev/2025"]);
        assert_eq!(overview.total, 300.0);
        assert_eq!(overview.average, 150.0);
        assert_eq!(overview.subtitle, DEFAULT_SALES_SUBTITLE);
        assert_eq!(overview.x_label, DEFAULT_X_LABEL);
        assert_eq!(overview.y_label, "Faturamento");
    }

    #[test]
    fn test_client_capture_percentages() {
        let capture = ClientCapture::from_response(&pie());
        assert_eq!(capture.total, 400.0);
        assert_eq!(capture.clients[0].percent, 75.0);
        assert_eq!(capture.clients[1].orders, 1);

        let sellers = SellerRanking::from_response(&pie());
        assert_eq!(sellers.sellers[0].percent, 100.0);
    }

    #[test]
    fn test_pie_cards_load_from_string_amounts() {
        let resp: PieResponse = serde_json::from_value(json!({
            "type": "pie",
            "data_clients": [
                {"client_name": "Acme", "value_purchased": "300.50", "total_orders": 3.0},
                {"client_name": "Beta", "value_purchased": "99.50", "total_orders": "1"}
            ],
            "data_sellers": [{"seller_name": "Ana", "total_sold": "50.00"}]
        }))
        .unwrap();
        let dashboard = Dashboard::from_responses(
            Err(ApiError::Cancelled),
            Ok(resp),
            Err(ApiError::Cancelled),
        );
        let capture = dashboard.clients.unwrap();
        assert_eq!(capture.total, 400.0);
        assert_eq!(capture.clients[0].orders, 3);
        assert_eq!(capture.clients[1].orders, 1);
        let sellers = dashboard.sellers.unwrap();
        assert_eq!(sellers.sellers[0].total_sold, 50.0);
        assert_eq!(sellers.sellers[0].percent, 100.0);
    }

    #[test]
    fn test_cards_fail_independently() {
        let dashboard = Dashboard::from_responses(
            Err(ApiError::Parse("x".into())),
            Ok(pie()),
            Err(ApiError::Cancelled),
        );
        assert_eq!(dashboard.sales, Err(LOAD_ERROR_TEXT.to_string()));
        assert!(dashboard.clients.is_ok());
        assert!(dashboard.years.is_empty());
        assert_eq!(dashboard.selectable_years(), vec!["2025", "2024", "2023", "2022"]);
    }

    #[test]
    fn test_selectable_years_prefers_api() {
        let dashboard = Dashboard::from_responses(Ok(bar()), Ok(pie()), Ok(vec!["2021".into()]));
        assert_eq!(dashboard.selectable_years(), vec!["2021"]);
    }
}
