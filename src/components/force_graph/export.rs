use wasm_bindgen::JsCast;
use web_sys::{HtmlAnchorElement, HtmlCanvasElement};

use crate::error::ExportError;

pub const EXPORT_FILE_NAME: &str = "knowledge-graph.png";

/// Downloads the canvas as a PNG through a temporary anchor element.
pub fn export_png(canvas: &HtmlCanvasElement) -> Result<(), ExportError> {
	let url = canvas
		.to_data_url_with_type("image/png")
		.map_err(|err| ExportError::Encode(format!("{err:?}")))?;
	let document = web_sys::window()
		.and_then(|w| w.document())
		.ok_or(ExportError::NoDocument)?;
	let anchor: HtmlAnchorElement = document
		.create_element("a")
		.map_err(|err| ExportError::Dom(format!("{err:?}")))?
		.dyn_into()
		.map_err(|_| ExportError::Dom("not an anchor element".into()))?;
	anchor.set_href(&url);
	anchor.set_download(EXPORT_FILE_NAME);
	let body = document.body().ok_or(ExportError::NoDocument)?;
	body.append_child(&anchor)
		.map_err(|err| ExportError::Dom(format!("{err:?}")))?;
	anchor.click();
	anchor.remove();
	log::info!("exported graph as {EXPORT_FILE_NAME}");
	Ok(())
}
