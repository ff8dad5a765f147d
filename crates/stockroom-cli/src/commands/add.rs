use crate::cli::ProductFields;
use crate::commands::common::{
    describe_delivery, draft_from_fields, normalize_name, open_catalog, AppContext,
};
use crate::error::CliError;

pub async fn run_add(
    name_parts: &[String],
    fields: ProductFields,
    ctx: &AppContext,
) -> Result<(), CliError> {
    let name = normalize_name(name_parts).ok_or(CliError::EmptyName)?;
    let draft = draft_from_fields(name, fields);

    let catalog = open_catalog(ctx, false).await?;
    let outcome = catalog.create(draft).await?;

    println!("{}", outcome.product.id);
    eprintln!("{}", describe_delivery(&outcome.delivery));
    Ok(())
}
