use crate::commands::common::{
    format_product_detail, normalize_product_id, open_catalog, product_to_item, AppContext,
};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, ctx: &AppContext) -> Result<(), CliError> {
    let id = normalize_product_id(id)?;
    let catalog = open_catalog(ctx, false).await?;
    let product = catalog
        .get(&id)
        .await?
        .ok_or_else(|| CliError::ProductNotFound(id.to_string()))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&product_to_item(&product))?);
    } else {
        for line in format_product_detail(&product) {
            println!("{line}");
        }
    }
    Ok(())
}
