//! Data acquisition: provider trait, HTTP seam, Alpha Vantage provider, CSV parsing.

pub mod alpha_vantage;
pub mod http;
pub mod parse;
pub mod provider;

pub use alpha_vantage::{api_key_from_env, AlphaVantageProvider, API_KEY_ENV, DEFAULT_BASE_URL};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use parse::parse_csv;
pub use provider::{CurrencyPair, DataError, DataProvider};
