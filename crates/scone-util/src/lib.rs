/// Generates a `u32` newtype used to index into a `Vec` of some element type,
/// so indices into different arenas cannot be mixed up.
///
/// ```ignore
/// make_type_idx!(#[derive(Serialize)] pub ProductionId, Production);
/// let id = ProductionId::from_push(&mut productions, production);
/// let production = &productions[id];
/// ```
#[macro_export]
macro_rules! make_type_idx {
    ($(#[$meta:meta])* $vis:vis $type_idx_name:ident, $type_name:ty) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        $(#[$meta])*
        $vis struct $type_idx_name(u32);

        #[allow(dead_code)]
        impl $type_idx_name {
            $vis fn new(index: usize) -> $type_idx_name {
                $type_idx_name(index as u32)
            }

            $vis fn index(self) -> usize {
                self.0 as usize
            }

            $vis fn from_push(vec: &mut Vec<$type_name>, val: $type_name) -> $type_idx_name {
                let idx = $type_idx_name(vec.len() as u32);
                vec.push(val);
                idx
            }
        }

        impl std::fmt::Display for $type_idx_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::ops::Index<$type_idx_name> for [$type_name] {
            type Output = $type_name;

            fn index(&self, index: $type_idx_name) -> &Self::Output {
                &self[index.0 as usize]
            }
        }

        impl std::ops::IndexMut<$type_idx_name> for [$type_name] {
            fn index_mut(&mut self, index: $type_idx_name) -> &mut Self::Output {
                &mut self[index.0 as usize]
            }
        }

        impl std::ops::Index<$type_idx_name> for Vec<$type_name> {
            type Output = $type_name;

            fn index(&self, index: $type_idx_name) -> &Self::Output {
                &self.as_slice()[index]
            }
        }

        impl std::ops::IndexMut<$type_idx_name> for Vec<$type_name> {
            fn index_mut(&mut self, index: $type_idx_name) -> &mut Self::Output {
                &mut self.as_mut_slice()[index]
            }
        }
    };
}
