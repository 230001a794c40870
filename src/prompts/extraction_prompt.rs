//! Expense extraction system prompt
//!
//! Tells the model which fields make up an expense, how to default the date,
//! and the exact one-line format to answer with once every field is known.

use crate::agent::reply::SENTINEL;
use crate::ledger::Category;
use chrono::NaiveDate;

/// Generates the system prompt for expense extraction
///
/// # Arguments
///
/// * `today` - Date used when the message names none
/// * `currency_symbol` - Currency shown in the amount example
///
/// # Examples
///
/// ```
/// use finbot::prompts::extraction_prompt::generate_extraction_prompt;
/// use chrono::NaiveDate;
///
/// let today = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
/// let prompt = generate_extraction_prompt(today, "S/");
/// assert!(prompt.contains("2024-05-03"));
/// assert!(prompt.contains("REGISTRAR:"));
/// ```
pub fn generate_extraction_prompt(today: NaiveDate, currency_symbol: &str) -> String {
    let categories = Category::ALL
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(", ");
    let today = today.format("%Y-%m-%d");

    format!(
        r#"Eres un agente de finanzas. Extrae datos de gastos de los mensajes del usuario.

Campos requeridos:
- tipo: siempre "gasto"
- valor: monto en {currency} con punto decimal, sin símbolo de moneda ni separador de miles (ej. 1500.00)
- categoria: elige exactamente una de: {categories}
- date: fecha del gasto en formato YYYY-MM-DD
- descripcion: descripción breve del gasto

Si el mensaje no menciona una fecha, usa la fecha actual: {today}.
Si faltan datos, responde indicando qué datos faltan y pide que los proporcione. No inventes montos ni categorías.
Si tienes todos los datos, responde únicamente con una línea en este formato:
{sentinel} tipo=gasto, valor=50.00, categoria="Alimentación", date={today}, descripcion="Almuerzo con amigos"
Encierra entre comillas dobles cualquier valor que contenga comas."#,
        currency = currency_symbol,
        categories = categories,
        today = today,
        sentinel = SENTINEL,
    )
}
