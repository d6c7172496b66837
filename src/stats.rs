use fnv::FnvHashMap;

/// Maps the original user and item identifiers to consecutive indices, in order of first
/// appearance.
pub struct DataDictionary {
    user_dict: FnvHashMap<String, u32>,
    item_dict: FnvHashMap<String, u32>,
    num_interactions: u64,
}

impl DataDictionary {

    pub fn new() -> Self {
        DataDictionary {
            user_dict: FnvHashMap::with_capacity_and_hasher(100, Default::default()),
            item_dict: FnvHashMap::with_capacity_and_hasher(100, Default::default()),
            num_interactions: 0,
        }
    }

    pub fn num_users(&self) -> usize {
        self.user_dict.len()
    }

    pub fn num_items(&self) -> usize {
        self.item_dict.len()
    }

    pub fn num_interactions(&self) -> u64 {
        self.num_interactions
    }

    pub fn user_index(&self, name: &str) -> Option<u32> {
        self.user_dict.get(name).cloned()
    }

    pub fn item_index(&self, name: &str) -> Option<u32> {
        self.item_dict.get(name).cloned()
    }

    /// Registers an interaction and returns the indices of its user and item.
    pub fn add(&mut self, user: &str, item: &str) -> (u32, u32) {
        let next_user_index = self.user_dict.len() as u32;
        let user_index = *self.user_dict.entry(user.to_owned()).or_insert(next_user_index);

        let next_item_index = self.item_dict.len() as u32;
        let item_index = *self.item_dict.entry(item.to_owned()).or_insert(next_item_index);

        self.num_interactions += 1;

        (user_index, item_index)
    }
}

impl<'a, I> From<I> for DataDictionary where I: Iterator<Item=&'a (String, String)> {

    fn from(interactions: I) -> Self {
        let mut data_dict = DataDictionary::new();
        for (user, item) in interactions {
            data_dict.add(user, item);
        }
        data_dict
    }
}

pub struct Renaming {
    user_names: FnvHashMap<u32, String>,
    item_names: FnvHashMap<u32, String>,
}

impl Renaming {

    pub fn user_name(&self, user_index: u32) -> &str {
        &self.user_names[&user_index]
    }

    pub fn item_name(&self, item_index: u32) -> &str {
        &self.item_names[&item_index]
    }
}

impl From<DataDictionary> for Renaming {

    fn from(data_dict: DataDictionary) -> Self {

        let user_names: FnvHashMap<u32, String> = data_dict.user_dict.into_iter()
            .map(|(user, user_index)| (user_index, user))
            .collect();

        let item_names: FnvHashMap<u32, String> = data_dict.item_dict.into_iter()
            .map(|(item, item_index)| (item_index, item))
            .collect();

        Renaming { user_names, item_names }
    }
}
