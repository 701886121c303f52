//! Use/ban list parsing for plot, folder and channel filters.

/// Split a mixed filter list into use and ban lists.
///
/// Values prefixed with `-` are bans, everything else is a use entry. An
/// empty use list means "accept all".
pub fn split_use_and_ban(values: &[String]) -> (Vec<String>, Vec<String>) {
    let mut use_list = Vec::new();
    let mut ban_list = Vec::new();
    for value in values {
        match value.strip_prefix('-') {
            Some(banned) if !banned.is_empty() => ban_list.push(banned.to_string()),
            _ => {
                if !value.is_empty() {
                    use_list.push(value.clone());
                }
            }
        }
    }
    (use_list, ban_list)
}
