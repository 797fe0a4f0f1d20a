//! Product catalog tools: category checks, filtered listing and keyword search.
//!
//! The catalog is held in memory. It is either the bundled demo catalog or a
//! JSON file of the same shape, read once when the tool source is loaded.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use super::{register_tool, Param, ParamType, ToolArgs, ToolFunction, ToolRegistration};
use super::{ToolError, ToolResult, ToolSignature, ToolSource};

/// Rows shown before the listing is cut short
const MAX_ROWS: usize = 6;
const MAX_SPEC_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub categories: Vec<String>,
    pub price: f64,
    pub spec: String,
    pub min_quantity: u32,
    pub max_quantity: u32,
}

/// Optional filters for [`Catalog::filter`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_quantity: Option<i64>,
    pub max_quantity: Option<i64>,
}

impl ProductFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.min_quantity.is_none()
            && self.max_quantity.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<String>,
    pub products: Vec<Product>,
}

impl Catalog {
    pub fn from_json_file(path: &std::path::Path) -> ToolResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ToolError::Internal(format!("failed to read catalog {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ToolError::Internal(format!("invalid catalog {}: {}", path.display(), e))
        })
    }

    pub fn has_category(&self, category: &str) -> bool {
        let wanted = category.trim().to_lowercase();
        self.categories.iter().any(|c| c.to_lowercase() == wanted)
    }

    /// Products passing every given filter, in catalog order.
    ///
    /// Category matching is loose: the category is compared against both the
    /// product name and its categories, and bag/storage requests also match
    /// related words.
    pub fn filter(&self, filter: &ProductFilter) -> Vec<&Product> {
        let terms = filter.category.as_deref().map(category_terms);
        self.products
            .iter()
            .filter(|product| {
                if let Some(terms) = &terms {
                    let name = product.name.to_lowercase();
                    let matched = terms.iter().any(|term| {
                        name.contains(term.as_str())
                            || product
                                .categories
                                .iter()
                                .any(|c| c.to_lowercase().contains(term.as_str()))
                    });
                    if !matched {
                        return false;
                    }
                }
                if filter.min_price.is_some_and(|min| product.price < min) {
                    return false;
                }
                if filter.max_price.is_some_and(|max| product.price > max) {
                    return false;
                }
                // the product must accept an order as small as the requested minimum
                if filter
                    .min_quantity
                    .is_some_and(|min| i64::from(product.min_quantity) > min)
                {
                    return false;
                }
                if filter
                    .max_quantity
                    .is_some_and(|max| i64::from(product.max_quantity) < max)
                {
                    return false;
                }
                true
            })
            .collect()
    }

    /// Score products against a keyword and its synonyms, best first.
    /// A hit in the name is worth 3, in a category 2 and in the spec 1.
    pub fn search(&self, keyword: &str) -> Vec<(&Product, u32)> {
        let keywords = expand_keywords(keyword);
        let mut scored: Vec<(&Product, u32)> = self
            .products
            .iter()
            .filter_map(|product| {
                let name = product.name.to_lowercase();
                let spec = product.spec.to_lowercase();
                let categories: Vec<String> =
                    product.categories.iter().map(|c| c.to_lowercase()).collect();
                let score: u32 = keywords
                    .iter()
                    .map(|kw| {
                        let mut score = 0;
                        if name.contains(kw.as_str()) {
                            score += 3;
                        }
                        if categories.iter().any(|c| c.contains(kw.as_str())) {
                            score += 2;
                        }
                        if spec.contains(kw.as_str()) {
                            score += 1;
                        }
                        score
                    })
                    .sum();
                (score > 0).then_some((product, score))
            })
            .collect();
        // stable, so ties keep catalog order
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
    }
}

impl Default for Catalog {
    fn default() -> Self {
        builtin_catalog()
    }
}

fn category_terms(category: &str) -> Vec<String> {
    let category = category.trim().to_lowercase();
    let terms: &[&str] = if category == "bags & storage" {
        &["bag", "pouch", "storage", "box", "case"]
    } else if category.contains("bag") {
        &["bag", "pouch"]
    } else if category.contains("storage") {
        &["storage", "box", "case", "bag", "pouch"]
    } else {
        return vec![category];
    };
    terms.iter().map(|t| t.to_string()).collect()
}

const SYNONYMS: &[(&str, &[&str])] = &[
    ("office", &["office supplies", "stationery", "business"]),
    ("stationery", &["pen", "notebook", "office supplies"]),
    ("storage", &["bags & storage", "organizer", "box"]),
    ("bag", &["bags & storage", "tote", "pouch"]),
    ("cup", &["cups & tableware", "mug", "tumbler"]),
    ("tableware", &["cups & tableware", "cutlery", "dining"]),
    ("clothes", &["apparel", "t-shirt", "cap"]),
    ("hat", &["cap", "beanie", "apparel"]),
    ("accessory", &["accessories", "keychain", "charm"]),
    ("relax", &["relaxing", "stress relief", "aroma"]),
    ("eco", &["eco-friendly", "recycled", "reusable"]),
    ("tech", &["high-tech", "modern", "wireless"]),
    ("fun", &["playful", "squishy", "toy"]),
    ("new year", &["lunar new year", "red envelope", "spring couplet"]),
    ("mid-autumn", &["mooncake", "reunion"]),
    ("dragon boat", &["zongzi", "rice dumpling"]),
    ("taiwan", &["taiwan specialties", "local", "oolong", "pineapple"]),
    ("gift", &["gift box", "gift set"]),
];

/// The keyword plus synonyms of every entry it contains or belongs to
pub fn expand_keywords(keyword: &str) -> Vec<String> {
    let keyword = keyword.trim().to_lowercase();
    let mut expanded = vec![keyword.clone()];
    for (key, synonyms) in SYNONYMS {
        if keyword.contains(key) {
            expanded.extend(synonyms.iter().map(|s| s.to_string()));
        } else if synonyms.contains(&keyword.as_str()) {
            expanded.push(key.to_string());
            expanded.extend(synonyms.iter().map(|s| s.to_string()));
        }
    }
    let mut seen = std::collections::HashSet::new();
    expanded.retain(|kw| seen.insert(kw.clone()));
    expanded
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn short_spec(spec: &str) -> String {
    if spec.chars().count() > MAX_SPEC_CHARS {
        let cut: String = spec.chars().take(MAX_SPEC_CHARS - 3).collect();
        format!("{}...", cut)
    } else {
        spec.to_string()
    }
}

/// Render up to [`MAX_ROWS`] products as an HTML table
pub fn render_table(products: &[&Product]) -> String {
    let mut html = String::from("<table><tr><th>Name</th><th>Price</th><th>Description</th></tr>");
    for product in products.iter().take(MAX_ROWS) {
        html.push_str(&format!(
            "<tr><td>{}</td><td>NT${}</td><td>{}</td></tr>",
            escape_html(&product.name),
            product.price.trunc() as i64,
            escape_html(&short_spec(&product.spec)),
        ));
    }
    html.push_str("</table>");
    if products.len() > MAX_ROWS {
        html.push_str(&format!(
            "<p>...and {} more products.</p>",
            products.len() - MAX_ROWS
        ));
    }
    html
}

pub struct ConfirmCategory {
    catalog: Arc<Catalog>,
    signature: ToolSignature,
}

impl ConfirmCategory {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let signature = ToolSignature::new("confirm_category")
            .with_description("Check whether a product category exists in the store catalog")
            .with_param(
                Param::required("category", ParamType::String)
                    .with_description("The category name to check"),
            );
        Self { catalog, signature }
    }
}

#[async_trait]
impl ToolFunction for ConfirmCategory {
    fn signature(&self) -> &ToolSignature {
        &self.signature
    }

    async fn call(&self, args: ToolArgs) -> ToolResult<String> {
        let category = args.str("category")?;
        if self.catalog.has_category(category) {
            Ok(format!("The category '{}' exists in the catalog.", category))
        } else {
            Ok(format!(
                "The category '{}' was not found. Available categories: {}.",
                category,
                self.catalog.categories.join(", ")
            ))
        }
    }
}

pub struct GetProduct {
    catalog: Arc<Catalog>,
    signature: ToolSignature,
}

impl GetProduct {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let signature = ToolSignature::new("get_product")
            .with_description(
                "List products by category, price range or order quantity. \
                 At least one filter must be given.",
            )
            .with_param(Param::optional("category", ParamType::String, Value::Null))
            .with_param(
                Param::optional("min_price", ParamType::Float, Value::Null)
                    .with_description("Lowest unit price in NT$"),
            )
            .with_param(
                Param::optional("max_price", ParamType::Float, Value::Null)
                    .with_description("Highest unit price in NT$"),
            )
            .with_param(Param::optional("min_quantity", ParamType::Integer, Value::Null))
            .with_param(Param::optional("max_quantity", ParamType::Integer, Value::Null));
        Self { catalog, signature }
    }
}

#[async_trait]
impl ToolFunction for GetProduct {
    fn signature(&self) -> &ToolSignature {
        &self.signature
    }

    async fn call(&self, args: ToolArgs) -> ToolResult<String> {
        let filter = ProductFilter {
            category: args
                .opt_str("category")?
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            min_price: args.opt_f64("min_price")?,
            max_price: args.opt_f64("max_price")?,
            min_quantity: args.opt_i64("min_quantity")?,
            max_quantity: args.opt_i64("max_quantity")?,
        };
        if filter.is_empty() {
            return Err(ToolError::execution(
                "get_product",
                "provide at least one of category, price range or quantity",
            ));
        }

        let products = self.catalog.filter(&filter);
        if products.is_empty() {
            return Ok("<p>No products match these conditions. \
                       Try a wider price range or another category.</p>"
                .to_string());
        }
        Ok(render_table(&products))
    }
}

pub struct SearchProducts {
    catalog: Arc<Catalog>,
    signature: ToolSignature,
}

impl SearchProducts {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let signature = ToolSignature::new("search_products_by_keyword")
            .with_description("Search products by a free-form keyword such as 'hat' or 'eco gift'")
            .with_param(Param::required("keyword", ParamType::String));
        Self { catalog, signature }
    }
}

#[async_trait]
impl ToolFunction for SearchProducts {
    fn signature(&self) -> &ToolSignature {
        &self.signature
    }

    async fn call(&self, args: ToolArgs) -> ToolResult<String> {
        let keyword = args.str("keyword")?.trim();
        if keyword.is_empty() {
            return Ok("Please provide a keyword to search for.".to_string());
        }

        let results = self.catalog.search(keyword);
        if results.is_empty() {
            return Ok(format!(
                "<p>Sorry, nothing matched '{}'. Try another keyword or browse by category.</p>",
                escape_html(keyword)
            ));
        }
        let products: Vec<&Product> = results.into_iter().map(|(product, _)| product).collect();
        Ok(format!(
            "<p>Products related to '{}':</p>{}",
            escape_html(keyword),
            render_table(&products)
        ))
    }
}

/// The catalog tools, backed by the bundled catalog or a JSON file
pub struct CatalogTools {
    path: Option<PathBuf>,
}

impl CatalogTools {
    pub fn builtin() -> Self {
        Self { path: None }
    }

    pub fn from_file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl ToolSource for CatalogTools {
    fn name(&self) -> &str {
        "catalog"
    }

    fn tools(&self) -> ToolResult<Vec<ToolRegistration>> {
        let catalog = Arc::new(match &self.path {
            Some(path) => Catalog::from_json_file(path)?,
            None => builtin_catalog(),
        });
        Ok(vec![
            register_tool(ConfirmCategory::new(Arc::clone(&catalog))),
            register_tool(GetProduct::new(Arc::clone(&catalog))),
            register_tool(SearchProducts::new(catalog)),
        ])
    }
}

fn product(
    name: &str,
    categories: &[&str],
    price: f64,
    spec: &str,
    quantity: (u32, u32),
) -> Product {
    Product {
        name: name.to_string(),
        categories: categories.iter().map(|c| c.to_string()).collect(),
        price,
        spec: spec.to_string(),
        min_quantity: quantity.0,
        max_quantity: quantity.1,
    }
}

/// The demo catalog bundled with the crate
pub fn builtin_catalog() -> Catalog {
    let categories = [
        "Stationery",
        "Office Supplies",
        "Cups & Tableware",
        "Bags & Storage",
        "Accessories",
        "Apparel",
        "Lifestyle",
        "Home",
        "Lunar New Year",
        "Mid-Autumn",
        "Dragon Boat",
        "Taiwan Specialties",
    ];
    let small = (1, 10);
    let products = vec![
        product(
            "Metal Ballpoint Pen",
            &["Stationery", "Office Supplies"],
            120.0,
            "Aluminium barrel ballpoint pen with an engraving area, 0.7 mm black ink",
            small,
        ),
        product(
            "Hardcover Notebook A5",
            &["Stationery"],
            280.0,
            "A5 dotted notebook, 160 pages, linen hardcover with elastic band",
            small,
        ),
        product(
            "Desk Organizer Set",
            &["Office Supplies", "Bags & Storage"],
            650.0,
            "Bamboo desk organizer with pen holder, card slot and phone stand",
            small,
        ),
        product(
            "Insulated Tumbler 500ml",
            &["Cups & Tableware"],
            590.0,
            "Double-wall stainless steel tumbler, keeps drinks hot for 6 hours",
            small,
        ),
        product(
            "Ceramic Mug",
            &["Cups & Tableware"],
            350.0,
            "Matte glazed ceramic mug, 350 ml, dishwasher safe",
            small,
        ),
        product(
            "Portable Cutlery Set",
            &["Cups & Tableware", "Lifestyle"],
            420.0,
            "Stainless steel spoon, fork and chopsticks in a canvas pouch",
            small,
        ),
        product(
            "Canvas Tote Bag",
            &["Bags & Storage"],
            390.0,
            "Heavy cotton canvas tote with inner pocket and a printable front panel",
            small,
        ),
        product(
            "Travel Pouch",
            &["Bags & Storage", "Accessories"],
            320.0,
            "Water-resistant zip pouch for cables and chargers",
            small,
        ),
        product(
            "Foldable Storage Box",
            &["Bags & Storage", "Home"],
            450.0,
            "Fabric storage box that folds flat, 30 x 30 x 30 cm",
            small,
        ),
        product(
            "Leather Keychain",
            &["Accessories"],
            260.0,
            "Vegetable-tanned leather keychain with a brass ring",
            small,
        ),
        product(
            "Embroidered Baseball Cap",
            &["Apparel", "Accessories"],
            480.0,
            "Six-panel cotton cap with adjustable strap and custom embroidery",
            small,
        ),
        product(
            "Knit Beanie",
            &["Apparel"],
            420.0,
            "Soft acrylic knit hat, one size, keeps ears warm",
            small,
        ),
        product(
            "Organic Cotton T-Shirt",
            &["Apparel"],
            550.0,
            "Unisex crew neck tee in organic cotton, sizes S to XXL",
            small,
        ),
        product(
            "Aroma Diffuser",
            &["Home", "Lifestyle"],
            890.0,
            "Ultrasonic diffuser with a warm night light, a relaxing gift",
            small,
        ),
        product(
            "Diatomite Bath Mat",
            &["Home", "Lifestyle"],
            690.0,
            "Quick-drying eco-friendly diatomite mat, folds for storage",
            (100, 3000),
        ),
        product(
            "Stress Relief Squeeze Toy",
            &["Lifestyle"],
            150.0,
            "Squishy toy in playful shapes for the office desk",
            small,
        ),
        product(
            "Reusable Shopping Bag",
            &["Bags & Storage", "Lifestyle"],
            180.0,
            "Recycled PET bag that folds into its own pocket",
            small,
        ),
        product(
            "Red Envelope Gift Set",
            &["Lunar New Year"],
            300.0,
            "Twelve foil-stamped red envelopes for the new year",
            small,
        ),
        product(
            "Spring Couplet Kit",
            &["Lunar New Year", "Home"],
            360.0,
            "Hand-lettered spring couplets with festive door decorations",
            small,
        ),
        product(
            "Mooncake Gift Box",
            &["Mid-Autumn"],
            780.0,
            "Six assorted mooncakes, a reunion season favourite",
            small,
        ),
        product(
            "Zongzi Sachet Charm",
            &["Dragon Boat", "Accessories"],
            220.0,
            "Embroidered rice dumpling sachet with herbal filling",
            small,
        ),
        product(
            "Pineapple Cake Box",
            &["Taiwan Specialties"],
            480.0,
            "Ten local pineapple cakes in a printed gift box",
            small,
        ),
        product(
            "Oolong Tea Gift Tin",
            &["Taiwan Specialties", "Cups & Tableware"],
            820.0,
            "High mountain oolong, 150 g in a decorative tin",
            small,
        ),
        product(
            "Wireless Charging Pad",
            &["Office Supplies", "Lifestyle"],
            750.0,
            "Slim 15 W wireless charger with a modern high-tech look",
            small,
        ),
    ];
    Catalog {
        categories: categories.iter().map(|c| c.to_string()).collect(),
        products,
    }
}
