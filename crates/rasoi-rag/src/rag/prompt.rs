//! Grounded prompt assembly and result-map extraction.

use crate::intent::{Intent, ResultShape, NUTRITION_FIELDS};
use crate::types::{Record, ResultMap, ResultPayload};

/// Fixed grounding preamble: answer only from the delimited context, never
/// mention the scaffolding sections, and admit when information is absent.
const GROUNDED_PREAMBLE: &str = "\
You are an expert assistant that extracts information from the CONTEXT provided \
between <context> and </context> tags. \
You offer a chat experience considering the information included in the CHAT HISTORY \
provided between <chat_history> and </chat_history> tags. \
When answering the question contained between <question> and </question> tags, \
be concise and do not hallucinate. \
If you don't have the information, just say so.\n\n\
Do not mention the CONTEXT or CHAT HISTORY used in your answer.";

/// Extract the per-turn result map from retrieved records.
///
/// Pure function of (records, intent). A record missing the key field for its
/// shape is a data-quality defect: it is skipped with a warning, the batch
/// continues. Only fields actually present on a record appear in the payload.
pub fn build_result_map(records: &[Record], intent: Intent) -> ResultMap {
    let shape = intent.shape();
    let mut map = ResultMap::new();

    for record in records {
        let Some(key) = record.text(shape.key_field()) else {
            tracing::warn!(
                field = shape.key_field(),
                "record missing key field, skipping"
            );
            continue;
        };

        match shape {
            ResultShape::TitleToInstructions => {
                let Some(instructions) = record.text("TRANSLATEDINSTRUCTIONS") else {
                    tracing::warn!(recipe = %key, "record missing instructions, skipping");
                    continue;
                };
                map.push(key, ResultPayload::Instructions(instructions));
            }
            ResultShape::NameToNutrition => {
                let fields: Vec<_> = NUTRITION_FIELDS
                    .iter()
                    .filter_map(|field| {
                        record
                            .get(field)
                            .map(|value| (field.to_string(), value.clone()))
                    })
                    .collect();
                map.push(key, ResultPayload::Nutrition(fields));
            }
        }
    }

    map
}

/// Render retrieved records as the numbered context block of the prompt.
pub fn render_context(records: &[Record]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            format!(
                "[{}] {}",
                i + 1,
                serde_json::to_string(record).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compose the grounded prompt: fixed preamble plus the three delimited
/// sections. Transient; never persisted beyond the completion call.
pub fn build_prompt(question: &str, history_text: &str, context_text: &str) -> String {
    format!(
        "{preamble}\n\n\
         <chat_history>\n{history}\n</chat_history>\n\
         <context>\n{context}\n</context>\n\
         <question>\n{question}\n</question>\n\
         Answer:",
        preamble = GROUNDED_PREAMBLE,
        history = history_text,
        context = context_text,
        question = question,
    )
}
