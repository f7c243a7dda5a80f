use once_cell::sync::Lazy;
use std::env;

pub static API_BASE: Lazy<String> = Lazy::new(|| {
    env::var("CATALOG_API_BASE")
        .unwrap_or_else(|_| "https://catalog.example.com/v1/products".to_string())
});

pub static USER_AGENT: Lazy<String> = Lazy::new(|| {
    env::var("CATALOG_USER_AGENT").unwrap_or_else(|_| {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 15_6_1) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36"
            .to_string()
    })
});
