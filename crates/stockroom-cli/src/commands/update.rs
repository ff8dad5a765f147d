use crate::commands::common::{
    describe_delivery, normalize_product_id, open_catalog, AppContext, ProductChanges,
};
use crate::error::CliError;

pub async fn run_update(id: &str, changes: ProductChanges, ctx: &AppContext) -> Result<(), CliError> {
    let id = normalize_product_id(id)?;
    if changes.is_empty() {
        return Err(CliError::NothingToUpdate);
    }

    let catalog = open_catalog(ctx, false).await?;
    let current = catalog
        .get(&id)
        .await?
        .ok_or_else(|| CliError::ProductNotFound(id.to_string()))?;
    let draft = changes.apply_to(current.draft())?;
    let outcome = catalog.update(&current.id, draft).await?;

    println!("{}", outcome.product.id);
    eprintln!("{}", describe_delivery(&outcome.delivery));
    Ok(())
}
