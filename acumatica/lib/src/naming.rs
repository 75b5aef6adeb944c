//! Identifier conversions for generated method names.

/// Splits a PascalCase or camelCase identifier into words.
///
/// A new word starts at an uppercase letter that follows a lowercase
/// letter or digit, or at the last capital of an acronym run that is
/// followed by a lowercase letter (`"HTTPClient"` → `["HTTP", "Client"]`).
pub fn split_camel_case(s: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut words = Vec::new();
    let mut word_start = 0;

    for i in 1..chars.len() {
        let (offset, current) = chars[i];
        let prev = chars[i - 1].1;
        let next_is_lower = chars.get(i + 1).is_some_and(|(_, c)| c.is_lowercase());

        let is_new_word = current.is_uppercase()
            && (prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower));

        if is_new_word {
            if offset > word_start {
                words.push(&s[word_start..offset]);
            }
            word_start = offset;
        }
    }

    if word_start < s.len() {
        words.push(&s[word_start..]);
    }

    words
}

/// Converts an identifier to lowercase words joined by `_`.
///
/// Underscores in the input are word boundaries; doubled separators
/// collapse to one.
pub fn to_snake_case(s: &str) -> String {
    s.split('_')
        .flat_map(split_camel_case)
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Derives a method name from an operationId of the form `<Tag>_<Action>`.
///
/// Returns `None` when the id has no `_` grouping separator.
///
/// ## Examples
///
/// ```rust
/// use acumatica_client::naming::method_name;
///
/// assert_eq!(method_name("Contact_GetById").as_deref(), Some("get_by_id"));
/// assert_eq!(
///     method_name("Test_InvokeAction_TestAction").as_deref(),
///     Some("invoke_action_test_action")
/// );
/// assert_eq!(method_name("NoSeparator"), None);
/// ```
pub fn method_name(operation_id: &str) -> Option<String> {
    let (_, action) = operation_id.split_once('_')?;
    let name = to_snake_case(action);
    if name.is_empty() { None } else { Some(name) }
}

/// Converts a free-form display name to a snake_case identifier.
///
/// Any run of characters that are not ASCII alphanumerics becomes a
/// single `_` (`"IN-Inventory Summary"` → `"in_inventory_summary"`).
pub fn identifier_from_display(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("gi_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_camel_case_multi_word() {
        assert_eq!(split_camel_case("GetAdHocSchema"), vec!["Get", "Ad", "Hoc", "Schema"]);
    }

    #[test]
    fn split_camel_case_with_acronym() {
        assert_eq!(split_camel_case("ChangeID"), vec!["Change", "ID"]);
        assert_eq!(split_camel_case("HTTPClient"), vec!["HTTP", "Client"]);
    }

    #[test]
    fn split_camel_case_single_and_empty() {
        assert_eq!(split_camel_case("Release"), vec!["Release"]);
        assert_eq!(split_camel_case(""), Vec::<&str>::new());
    }

    #[test]
    fn split_camel_case_after_digit() {
        assert_eq!(split_camel_case("Level2Approve"), vec!["Level2", "Approve"]);
    }

    #[test]
    fn method_name_standard_kinds() {
        assert_eq!(method_name("Customer_GetList").unwrap(), "get_list");
        assert_eq!(method_name("Customer_PutEntity").unwrap(), "put_entity");
        assert_eq!(method_name("Customer_DeleteByKeys").unwrap(), "delete_by_keys");
        assert_eq!(method_name("Customer_PutFile").unwrap(), "put_file");
        assert_eq!(method_name("Customer_GetAdHocSchema").unwrap(), "get_ad_hoc_schema");
    }

    #[test]
    fn method_name_collapses_doubled_separators() {
        assert_eq!(
            method_name("SalesOrder_InvokeAction__ReleaseFromHold").unwrap(),
            "invoke_action_release_from_hold"
        );
        assert_eq!(
            method_name("Customer_InvokeAction_ChangeID").unwrap(),
            "invoke_action_change_id"
        );
    }

    #[test]
    fn method_name_requires_separator() {
        assert_eq!(method_name("GetList"), None);
        assert_eq!(method_name("Customer_"), None);
    }

    #[test]
    fn identifier_from_display_names() {
        assert_eq!(identifier_from_display("IN-Inventory Summary"), "in_inventory_summary");
        assert_eq!(identifier_from_display("Account Details"), "account_details");
        assert_eq!(identifier_from_display("  GL--Trial  Balance "), "gl_trial_balance");
        assert_eq!(identifier_from_display("1099 Vendors"), "gi_1099_vendors");
    }
}
